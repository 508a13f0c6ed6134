// src/traversal/stealth.rs
//! Best-effort session hardening applied before the first navigation. None of it is
//! required for a run to proceed.

use crate::browser::{BrowserSession, Viewport};
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

const VIEWPORTS: &[Viewport] = &[
    Viewport { width: 1920, height: 1080 },
    Viewport { width: 1536, height: 864 },
    Viewport { width: 1440, height: 900 },
    Viewport { width: 1366, height: 768 },
];

const HIDE_WEBDRIVER_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
window.chrome = window.chrome || { runtime: {} };
"#;

fn extra_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
        (
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        ),
    ])
}

pub async fn harden_session<B: BrowserSession + ?Sized>(session: &mut B) {
    let viewport = *VIEWPORTS.choose(&mut rand::thread_rng()).unwrap_or(&VIEWPORTS[0]);
    if let Err(e) = session.set_viewport(viewport).await {
        tracing::warn!("Could not set viewport: {}", e);
    }
    if let Err(e) = session.set_extra_headers(&extra_headers()).await {
        tracing::warn!("Could not set extra headers: {}", e);
    }
    if let Err(e) = session.add_init_script(HIDE_WEBDRIVER_SCRIPT).await {
        tracing::debug!("Init script not installed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::memory::MemorySession;

    #[tokio::test]
    async fn test_hardening_configures_session() {
        let mut session = MemorySession::new();
        harden_session(&mut session).await;

        assert!(session.viewport.is_some_and(|v| VIEWPORTS.contains(&v)));
        assert_eq!(session.extra_headers.get("Accept-Language").map(String::as_str), Some("en-US,en;q=0.9"));
        assert_eq!(session.init_scripts.len(), 1);
        assert!(session.init_scripts[0].contains("webdriver"));
    }
}
