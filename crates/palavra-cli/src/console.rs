// Console front end: reads answer/command lines, prints session snapshots.
//
// Mirrors the session loop from the other side of the channels. Snapshots
// arrive on `ui_rx` and are re-rendered when they change; each typed line is
// parsed and forwarded on `cmd_tx`.

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use palavra_app::protocol::{SessionSnapshot, UiUpdate, UserCommand};

use crate::input::{parse_line, Input};
use crate::render::{render_snapshot, HELP_TEXT, PROMPT};

/// Run against the process's stdin/stdout until the user quits or stdin
/// closes.
pub async fn run(
    ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    run_with(reader, writer, ui_rx, cmd_tx).await
}

/// The console loop over an arbitrary line source and sink.
pub async fn run_with<R, W>(
    reader: R,
    mut writer: W,
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut last: Option<SessionSnapshot> = None;

    write_out(&mut writer, HELP_TEXT).await?;

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(UiUpdate::Snapshot(snapshot)) => {
                        if last.as_ref() == Some(&*snapshot) {
                            continue;
                        }
                        let screen = format!("\n{}{}", render_snapshot(&snapshot), PROMPT);
                        write_out(&mut writer, &screen).await?;
                        last = Some(*snapshot);
                    }
                    None => {
                        info!("UI channel closed, leaving console");
                        break;
                    }
                }
            }

            line = lines.next_line() => {
                let line = line.context("failed to read input line")?;
                let Some(line) = line else {
                    info!("Input closed, quitting");
                    let _ = cmd_tx.send(UserCommand::Quit).await;
                    break;
                };

                match parse_line(&line) {
                    Input::Help => {
                        write_out(&mut writer, HELP_TEXT).await?;
                        write_out(&mut writer, PROMPT).await?;
                    }
                    Input::Command(UserCommand::Quit) => {
                        let _ = cmd_tx.send(UserCommand::Quit).await;
                        break;
                    }
                    Input::Command(cmd) => {
                        debug!("Forwarding command: {:?}", cmd);
                        if cmd_tx.send(cmd).await.is_err() {
                            info!("Session loop gone, leaving console");
                            break;
                        }
                    }
                }
            }
        }
    }

    write_out(&mut writer, "\n").await?;
    Ok(())
}

async fn write_out<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> anyhow::Result<()> {
    writer
        .write_all(text.as_bytes())
        .await
        .context("failed to write to console")?;
    writer.flush().await.context("failed to flush console")?;
    Ok(())
}
