use tracing::{debug, error, warn};

use {
    switchyard_auth::{Token, TokenStore},
    switchyard_protocol::VerifyOutcome,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Constant-time string comparison (prevents timing attacks).
fn safe_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

// ── Token check ──────────────────────────────────────────────────────────────

/// Load `account`'s token and compare it with the presented one.
///
/// Store failures of any kind collapse into [`VerifyOutcome::SystemError`];
/// the detail only goes to the log. Returns the token on a match so the
/// caller can bind its allocated servers.
pub async fn check_token(
    store: &dyn TokenStore,
    account: &str,
    presented: &str,
) -> Result<Token, VerifyOutcome> {
    let token = match store.load(account).await {
        Ok(token) => token,
        Err(e) => {
            error!(account, error = %e, "token load failed");
            return Err(VerifyOutcome::SystemError);
        },
    };
    if !safe_equal(presented, &token.token) {
        warn!(account, "token verification failed");
        return Err(VerifyOutcome::TokenMismatch);
    }
    debug!(account, servers = token.allocated_servers.len(), "token verified");
    Ok(token)
}
