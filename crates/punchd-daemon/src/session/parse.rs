//! Email extraction from page content.
//!
//! Primary path: the portal homepage embeds a `session_info` script block
//! whose JSON carries the logged-in username. Fallback path: scan page
//! script text from the companion chat tab for an email on the
//! organization's mail domain.

use regex::Regex;
use tracing::debug;

const SESSION_INFO_PREFIX: &str = "odoo.session_info = ";

/// Pull the username out of the homepage's session-info script block.
pub fn session_info_email(html: &str) -> Option<String> {
    let script_re =
        Regex::new(r#"(?s)<script type="text/javascript">(.*?)</script>"#).ok()?;

    for capture in script_re.captures_iter(html) {
        let body = capture.get(1)?.as_str().trim();
        let Some(rest) = body.strip_prefix(SESSION_INFO_PREFIX) else {
            continue;
        };

        let json = rest.trim().trim_end_matches(';');
        match serde_json::from_str::<serde_json::Value>(json) {
            Ok(info) => {
                return info
                    .get("username")
                    .and_then(|u| u.as_str())
                    .map(str::to_string);
            }
            Err(e) => {
                debug!(
                    event = "daemon.session.session_info_parse_failed",
                    error = %e
                );
                return None;
            }
        }
    }

    None
}

/// Find an email-shaped token on the organization's mail domain.
pub fn domain_email(text: &str, email_domain: &str) -> Option<String> {
    let pattern = format!(r#""([\w.-]+@{})""#, regex::escape(email_domain));
    let re = Regex::new(&format!("(?i){}", pattern)).ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
