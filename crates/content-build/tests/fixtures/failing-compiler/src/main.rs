//! Test fixture data compiler: always reports a compilation failure.
//! Used to exercise `spec.md` §8, S6.

use std::io::{BufRead, Write};

use content_build_compiler::ipc::{BuildResult, Message, VersionData};

fn main() {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let Ok(message) = Message::decode_line(&line) else {
            continue;
        };

        let reply = match message {
            Message::VersionQuery(_) => Message::VersionData(VersionData { version: 1 }),
            Message::BuildRequest(req) => Message::BuildResult(BuildResult {
                source_path: req.source_path,
                target_path: req.target_path,
                platform: req.platform,
                success: false,
                errors: vec!["bad input".to_owned()],
                outputs: vec![],
                references: vec![],
            }),
            _ => continue,
        };

        if let Ok(encoded) = reply.encode_line() {
            let _ = stdout.write_all(encoded.as_bytes());
            let _ = stdout.flush();
        }
    }
}
