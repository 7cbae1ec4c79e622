use std::io::{self, Write as _};
use std::sync::Arc;

use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use sevench::config::{Backend, Config};
use sevench::confirm::ConfirmPrompt;
use sevench::gateway::{inmem::InMemGateway, rest::RestGateway, DataGateway};
use sevench::models::Id;
use sevench::thread_list::ThreadListController;
use sevench::thread_view::ThreadViewController;

/// Blocking y/N prompt on stdin. Anything but an explicit yes declines.
struct StdinConfirm;

impl ConfirmPrompt for StdinConfirm {
    fn confirm(&self, message: &str) -> bool {
        print!("{message} [y/N] ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim(), "y" | "Y" | "yes")
    }
}

fn read_line() -> Option<String> {
    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(0) => None, // EOF
        Ok(_) => Some(line.trim().to_string()),
        Err(_) => None,
    }
}

fn render_list(ctrl: &ThreadListController) {
    let s = ctrl.state();
    println!();
    if s.threads.is_empty() {
        println!("(no threads on this page)");
    }
    for t in &s.threads {
        println!("#{}  {}  [{}]", t.id, t.title, t.created_at.format("%Y-%m-%d %H:%M"));
        if !t.description.is_empty() {
            println!("     {}", t.description);
        }
    }
    let w = s.window();
    println!(
        "-- page {}/{} ({} threads) --",
        s.page_index,
        w.total_pages(),
        s.total_count
    );
}

fn render_view(ctrl: &ThreadViewController) {
    let s = ctrl.state();
    println!();
    match &s.thread {
        Some(t) => println!("=== {} ===", t.title),
        None => println!("=== thread not found ==="),
    }
    if s.posts.is_empty() {
        println!("(no posts yet)");
    }
    for p in &s.posts {
        println!("#{}  {}  [{}]", p.id, p.content, p.created_at.format("%Y-%m-%d %H:%M"));
        for c in s.comments_for(p.id) {
            println!("      > {}", c.content);
        }
        if s.selected_post_id == Some(p.id) {
            println!("      (comment form open: `send <text>` to submit, bare `send` to cancel)");
        }
    }
    let w = s.window();
    println!(
        "-- page {}/{} ({} posts) --",
        s.page_index,
        w.total_pages(),
        s.total_post_count
    );
}

fn list_help() {
    println!("commands: new <title> | <description>, open <id>, rm <id>, next, prev, page <n>, quit");
}

fn view_help() {
    println!("commands: post <text>, comment <post id>, send [text], rm <post id>, next, prev, back, quit");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = Config::from_env()?;
    let gateway: Arc<dyn DataGateway> = match cfg.backend {
        Backend::Rest => {
            info!(url = %cfg.api_url, "using REST gateway");
            Arc::new(RestGateway::new(&cfg.api_url, &cfg.api_key)?)
        }
        Backend::Memory => {
            info!("using in-memory gateway (demo mode, nothing is persisted)");
            Arc::new(InMemGateway::new())
        }
    };

    let mut list = ThreadListController::new(gateway.clone(), cfg.page_size);
    let mut view = ThreadViewController::new(gateway, cfg.page_size);
    let confirm = StdinConfirm;

    if let Err(e) = list.load(1).await {
        eprintln!("initial load failed: {e}");
    }
    render_list(&list);
    list_help();

    // Which screen is showing: None = thread index, Some(id) = thread view.
    let mut open_thread: Option<Id> = None;

    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let Some(line) = read_line() else { break };
        let (cmd, rest) = match line.split_once(' ') {
            Some((c, r)) => (c, r.trim()),
            None => (line.as_str(), ""),
        };

        let result = match (open_thread, cmd) {
            (_, "quit") | (_, "q") => break,

            // thread index
            (None, "new") => {
                let (title, description) = match rest.split_once('|') {
                    Some((t, d)) => (t.trim(), d.trim()),
                    None => (rest, ""),
                };
                match list.create(title, description).await {
                    Ok(Some(thread)) => {
                        // navigate straight to the new thread
                        open_thread = Some(thread.id);
                        let r = view.load(open_thread, 1).await;
                        render_view(&view);
                        view_help();
                        r
                    }
                    Ok(None) => {
                        println!("a title is required");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            (None, "open") => match rest.parse::<Id>() {
                Ok(id) => {
                    open_thread = Some(id);
                    let r = view.load(open_thread, 1).await;
                    render_view(&view);
                    view_help();
                    r
                }
                Err(_) => {
                    println!("usage: open <thread id>");
                    Ok(())
                }
            },
            (None, "rm") => match rest.parse::<Id>() {
                Ok(id) => {
                    let r = list.delete(id, &confirm).await.map(|_| ());
                    render_list(&list);
                    r
                }
                Err(_) => {
                    println!("usage: rm <thread id>");
                    Ok(())
                }
            },
            (None, "next") => {
                let r = list.next_page().await;
                render_list(&list);
                r
            }
            (None, "prev") => {
                let r = list.prev_page().await;
                render_list(&list);
                r
            }
            (None, "page") => match rest.parse::<u64>() {
                Ok(n) => {
                    let r = list.goto_page(n).await;
                    render_list(&list);
                    r
                }
                Err(_) => {
                    println!("usage: page <n>");
                    Ok(())
                }
            },

            // thread view
            (Some(_), "post") => {
                let r = view.add_post(rest).await;
                render_view(&view);
                r
            }
            (Some(_), "comment") => match rest.parse::<Id>() {
                Ok(post_id) => {
                    view.select_post_for_comment(post_id);
                    render_view(&view);
                    Ok(())
                }
                Err(_) => {
                    println!("usage: comment <post id>");
                    Ok(())
                }
            },
            (Some(_), "send") => match view.state().selected_post_id {
                Some(post_id) => {
                    let r = view.add_comment(post_id, rest).await;
                    render_view(&view);
                    r
                }
                None => {
                    println!("no comment form open (use `comment <post id>` first)");
                    Ok(())
                }
            },
            (Some(_), "rm") => match rest.parse::<Id>() {
                Ok(post_id) => {
                    let r = view.delete_post(post_id, &confirm).await.map(|_| ());
                    render_view(&view);
                    r
                }
                Err(_) => {
                    println!("usage: rm <post id>");
                    Ok(())
                }
            },
            (Some(_), "next") => {
                let r = view.next_page().await;
                render_view(&view);
                r
            }
            (Some(_), "prev") => {
                let r = view.prev_page().await;
                render_view(&view);
                r
            }
            (Some(_), "back") => {
                open_thread = None;
                let r = list.load(list.state().page_index).await;
                render_list(&list);
                list_help();
                r
            }

            (_, "") => Ok(()),
            _ => {
                if open_thread.is_some() {
                    view_help();
                } else {
                    list_help();
                }
                Ok(())
            }
        };

        // No failure is fatal; keep showing the last good state.
        if let Err(e) = result {
            eprintln!("error: {e}");
        }
    }

    Ok(())
}
