use std::env;
use std::io::Write as _;

use anyhow::Context;
use log::warn;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tokio::task::LocalSet;

use github_user_search::{GithubClient, Phase, ResultsController};

fn main() -> anyhow::Result<()> {
    // Load .env variables
    dotenvy::dotenv().ok();
    env_logger::init();

    let token: Option<String> = env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
    let client = GithubClient::new(token.as_deref())?;

    // Single-threaded runtime: the controller and every completion run
    // on this one thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let local = LocalSet::new();
    runtime.block_on(local.run_until(run(ResultsController::new(client))))
}

async fn run(controller: ResultsController<GithubClient>) -> anyhow::Result<()> {
    // =============================================
    //  LISTENER: re-render on every visible change
    // =============================================
    {
        let weak = controller.downgrade();
        controller.set_on_results_changed(move || {
            if let Some(controller) = weak.upgrade() {
                render(&controller);
            }
        });
    }

    println!("GitHub user search. Type a query; :next for more, :open N, :quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("search> ");
        std::io::stdout().flush().ok();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            cmd if cmd.starts_with(':') => {
                let mut parts = cmd.split_whitespace();
                match parts.next() {
                    Some(":quit") | Some(":q") => break,
                    Some(":next") | Some(":n") => {
                        let (done_tx, done_rx) = oneshot::channel();
                        if controller.load_next_page(move || {
                            let _ = done_tx.send(());
                        }) {
                            println!("loading more...");
                            let _ = done_rx.await;
                        } else if controller.has_next_page() {
                            println!("a fetch is already running");
                        } else {
                            println!("no more results");
                        }
                    }
                    Some(":open") | Some(":o") => {
                        let index = parts.next().and_then(|n| n.parse::<usize>().ok());
                        open_profile(&controller, index);
                    }
                    _ => println!("commands: :next, :open N, :quit"),
                }
            }
            query => {
                let (done_tx, done_rx) = oneshot::channel();
                if controller.search(query, move || {
                    let _ = done_tx.send(());
                }) {
                    println!("searching...");
                    let _ = done_rx.await;
                    if controller.users().is_empty() && controller.phase() == Phase::Loaded {
                        println!("no users match {query:?}");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Prints the numbered result list. Rows with a profile URL carry the
/// `>` marker to show they can be opened.
fn render(controller: &ResultsController<GithubClient>) {
    let users = controller.users();
    if users.is_empty() {
        println!("(no results)");
        return;
    }
    println!();
    for (index, user) in users.iter().enumerate() {
        let marker = if user.html_url.is_some() { ">" } else { " " };
        println!("{:>3} {marker} {}", index + 1, user.login);
    }
    if controller.has_next_page() {
        println!("      ... more available (:next)");
    }
}

/// Opens the selected user's profile in the default browser. Rows
/// without a profile URL are not navigable.
fn open_profile(controller: &ResultsController<GithubClient>, index: Option<usize>) {
    let users = controller.users();
    let Some(user) = index
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| users.get(i))
    else {
        println!("usage: :open N (1-{})", users.len());
        return;
    };
    match &user.html_url {
        Some(url) => {
            if let Err(err) = open::that(url) {
                warn!("failed to open {url}: {err}");
            }
        }
        None => println!("{} has no profile link", user.login),
    }
}
