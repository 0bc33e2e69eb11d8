use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::poll::poller::{PollCycle, Poller};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "show" | "visible" => Some(Self::Visible),
            "hide" | "hidden" => Some(Self::Hidden),
            _ => None,
        }
    }
}

/// Anything that can be paused while nobody is looking.
pub trait Lifecycle {
    fn start(&mut self);
    fn stop(&mut self);
}

impl<C: PollCycle> Lifecycle for Poller<C> {
    fn start(&mut self) {
        Poller::start(self);
    }

    fn stop(&mut self) {
        Poller::stop(self);
    }
}

/// Every transition is acted on immediately; no debouncing.
pub fn on_visibility(target: &mut impl Lifecycle, visibility: Visibility) {
    match visibility {
        Visibility::Hidden => {
            info!("page hidden, pausing polling");
            target.stop();
        }
        Visibility::Visible => {
            info!("page visible, resuming polling");
            target.start();
        }
    }
}

/// Terminal stand-in for page visibility: `hide` / `show` lines on stdin.
pub async fn read_stdin_visibility(tx: mpsc::Sender<Visibility>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Visibility::parse(&line) {
            Some(visibility) => {
                if tx.send(visibility).await.is_err() {
                    break;
                }
            }
            None if line.trim().is_empty() => {}
            None => warn!(input = %line.trim(), "expected `hide` or `show`"),
        }
    }
    Ok(())
}
