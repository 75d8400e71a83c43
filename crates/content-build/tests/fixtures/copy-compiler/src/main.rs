//! Test fixture data compiler: copies the source file's bytes verbatim
//! to its target path. Used to exercise the happy-path build scenarios
//! (`spec.md` §8, S1/S2/S4).

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
            Message::BuildRequest(req) => {
                let output_path = format!("{}.txt", req.target_path);
                match std::fs::read(&req.source_path) {
                    Ok(bytes) => {
                        if std::fs::write(&output_path, bytes).is_ok() {
                            Message::BuildResult(BuildResult {
                                source_path: req.source_path,
                                target_path: req.target_path,
                                platform: req.platform,
                                success: true,
                                errors: vec![],
                                outputs: vec![output_path],
                                references: vec![],
                            })
                        } else {
                            Message::BuildResult(BuildResult {
                                source_path: req.source_path,
                                target_path: req.target_path,
                                platform: req.platform,
                                success: false,
                                errors: vec!["failed to write output".to_owned()],
                                outputs: vec![],
                                references: vec![],
                            })
                        }
                    }
                    Err(e) => Message::BuildResult(BuildResult {
                        source_path: req.source_path,
                        target_path: req.target_path,
                        platform: req.platform,
                        success: false,
                        errors: vec![e.to_string()],
                        outputs: vec![],
                        references: vec![],
                    }),
                }
            }
            _ => continue,
        };

        if let Ok(encoded) = reply.encode_line() {
            let _ = stdout.write_all(encoded.as_bytes());
            let _ = stdout.flush();
        }
    }
}
