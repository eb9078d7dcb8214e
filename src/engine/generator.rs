use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::move_record::MoveInput;

#[derive(Debug)]
pub enum GeneratorError {
    Spawn(String),
    Io(String),
    Timeout,
    Malformed(String),
}

impl std::fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorError::Spawn(msg) => write!(f, "Failed to start engine: {}", msg),
            GeneratorError::Io(msg) => write!(f, "Engine I/O error: {}", msg),
            GeneratorError::Timeout => write!(f, "Engine timed out"),
            GeneratorError::Malformed(msg) => write!(f, "Malformed engine reply: {}", msg),
        }
    }
}

impl std::error::Error for GeneratorError {}

/// Asynchronous best-move source for bot matches. May fail or time out; the
/// caller treats that as the bot skipping its turn.
#[async_trait]
pub trait MoveGenerator: Send + Sync {
    async fn best_move(&self, position: &str) -> Result<MoveInput, GeneratorError>;
}

struct EngineIo {
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    _child: Child,
}

/// Move generator over a persistent engine subprocess speaking the textual
/// UCI protocol: submit a position, request a depth-bounded search, read the
/// `bestmove` reply.
pub struct UciGenerator {
    io: Mutex<EngineIo>,
    depth: u32,
    timeout: Duration,
}

impl UciGenerator {
    pub fn spawn(command: &str, depth: u32, timeout: Duration) -> Result<Self, GeneratorError> {
        let mut child = Command::new(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| GeneratorError::Spawn(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GeneratorError::Spawn("no stdin handle".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GeneratorError::Spawn("no stdout handle".to_string()))?;

        Ok(UciGenerator {
            io: Mutex::new(EngineIo {
                stdin,
                lines: BufReader::new(stdout).lines(),
                _child: child,
            }),
            depth,
            timeout,
        })
    }

    async fn request(&self, position: &str) -> Result<MoveInput, GeneratorError> {
        let mut io = self.io.lock().await;

        let commands = format!("position fen {}\ngo depth {}\n", position, self.depth);
        io.stdin
            .write_all(commands.as_bytes())
            .await
            .map_err(|e| GeneratorError::Io(e.to_string()))?;
        io.stdin
            .flush()
            .await
            .map_err(|e| GeneratorError::Io(e.to_string()))?;

        loop {
            let line = io
                .lines
                .next_line()
                .await
                .map_err(|e| GeneratorError::Io(e.to_string()))?
                .ok_or_else(|| GeneratorError::Io("engine closed its output".to_string()))?;

            if let Some(reply) = line.strip_prefix("bestmove") {
                debug!("engine reply: {}", line.trim());
                return parse_best_move(reply.trim());
            }
        }
    }
}

#[async_trait]
impl MoveGenerator for UciGenerator {
    async fn best_move(&self, position: &str) -> Result<MoveInput, GeneratorError> {
        match tokio::time::timeout(self.timeout, self.request(position)).await {
            Ok(result) => result,
            Err(_) => Err(GeneratorError::Timeout),
        }
    }
}

/// Parses the move token of a `bestmove` reply: a 4-character square pair,
/// optionally followed by a promotion piece letter (e.g. `e7e8q`).
fn parse_best_move(reply: &str) -> Result<MoveInput, GeneratorError> {
    let token = reply
        .split_whitespace()
        .next()
        .ok_or_else(|| GeneratorError::Malformed("empty bestmove reply".to_string()))?;

    let bytes = token.as_bytes();
    let is_square = |file: u8, rank: u8| (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank);
    if bytes.len() < 4 || !is_square(bytes[0], bytes[1]) || !is_square(bytes[2], bytes[3]) {
        return Err(GeneratorError::Malformed(token.to_string()));
    }

    Ok(MoveInput {
        from: token[0..2].to_string(),
        to: token[2..4].to_string(),
        promotion: if token.len() > 4 {
            Some(token[4..5].to_string())
        } else {
            None
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_move() {
        let mv = parse_best_move("e2e4").unwrap();
        assert_eq!(mv.from, "e2");
        assert_eq!(mv.to, "e4");
        assert_eq!(mv.promotion, None);
    }

    #[test]
    fn parses_promotion_and_trailing_ponder() {
        let mv = parse_best_move("e7e8q ponder d7d5").unwrap();
        assert_eq!(mv.from, "e7");
        assert_eq!(mv.to, "e8");
        assert_eq!(mv.promotion, Some("q".to_string()));
    }

    #[test]
    fn rejects_short_replies() {
        assert!(matches!(
            parse_best_move("(none)"),
            Err(GeneratorError::Malformed(_))
        ));
        assert!(matches!(
            parse_best_move("e2"),
            Err(GeneratorError::Malformed(_))
        ));
        assert!(matches!(
            parse_best_move(""),
            Err(GeneratorError::Malformed(_))
        ));
    }
}
