use examstatd::{config::Config, ipc, logging};
use std::io::{self, BufRead, Write};

fn main() {
    let config = Config::from_env();
    logging::init_tracing(config.log_json, &config.log_level);

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
    };
    if let Some(path) = config.workspace.as_deref() {
        if let Err(e) = ipc::select_workspace(&mut state, path) {
            tracing::warn!(
                workspace = %path.display(),
                error = %e,
                "could not open configured workspace"
            );
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "examstatd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "unparseable request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
