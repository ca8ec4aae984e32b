//! Token command identity: run a configured program whose stdout is an access token.
//! No shell is used; the program and its arguments come from config as a list.

use super::IdentityService;
use async_trait::async_trait;
use tokio::sync::Mutex;

pub struct CommandIdentity {
    argv: Vec<String>,
    client_id: Option<String>,
    scopes: Vec<String>,
    /// Last token printed by the command. Held across the command run so concurrent
    /// interactive sign-ins run it once.
    cached: Mutex<Option<String>>,
}

impl CommandIdentity {
    pub fn new(argv: Vec<String>, client_id: Option<String>, scopes: Vec<String>) -> Self {
        Self {
            argv,
            client_id,
            scopes,
            cached: Mutex::new(None),
        }
    }

    /// Forget the cached token; the next interactive call runs the command again.
    pub async fn clear_cached_token(&self) {
        *self.cached.lock().await = None;
    }

    async fn run(&self) -> Result<String, String> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| "identity token command is empty".to_string())?;
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args);
        if let Some(ref id) = self.client_id {
            cmd.env("CANVASQA_CLIENT_ID", id);
        }
        if !self.scopes.is_empty() {
            cmd.env("CANVASQA_SCOPES", self.scopes.join(" "));
        }
        let output = cmd
            .output()
            .await
            .map_err(|e| format!("exec {} failed: {}", program, e))?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if output.status.success() {
            Ok(stdout)
        } else {
            let detail = if stderr.is_empty() { stdout } else { stderr };
            Err(format!("{} exited with {}: {}", program, output.status, detail))
        }
    }
}

#[async_trait]
impl IdentityService for CommandIdentity {
    fn name(&self) -> &str {
        "command"
    }

    async fn get_auth_token(&self, interactive: bool) -> Result<String, String> {
        let mut cached = self.cached.lock().await;
        if let Some(ref token) = *cached {
            return Ok(token.clone());
        }
        if !interactive {
            return Err("interactive sign-in required".to_string());
        }
        let token = self.run().await?;
        if !token.is_empty() {
            *cached = Some(token.clone());
        }
        Ok(token)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandIdentity {
        CommandIdentity::new(
            vec!["sh".into(), "-c".into(), script.into()],
            Some("client-123".into()),
            vec!["openid".into(), "drive.file".into()],
        )
    }

    #[tokio::test]
    async fn non_interactive_without_cache_fails() {
        let id = sh("echo tok");
        let err = id.get_auth_token(false).await.unwrap_err();
        assert_eq!(err, "interactive sign-in required");
    }

    #[tokio::test]
    async fn interactive_runs_command_then_caches() {
        let id = sh("echo tok-$CANVASQA_CLIENT_ID");
        assert_eq!(id.get_auth_token(true).await.unwrap(), "tok-client-123");
        assert_eq!(id.get_auth_token(false).await.unwrap(), "tok-client-123");
        id.clear_cached_token().await;
        assert!(id.get_auth_token(false).await.is_err());
    }

    #[tokio::test]
    async fn scopes_are_space_joined() {
        let id = sh("echo \"$CANVASQA_SCOPES\"");
        assert_eq!(id.get_auth_token(true).await.unwrap(), "openid drive.file");
    }

    #[tokio::test]
    async fn failing_command_reports_stderr() {
        let id = sh("echo denied >&2; exit 3");
        let err = id.get_auth_token(true).await.unwrap_err();
        assert!(err.contains("denied"), "{}", err);
    }
}
