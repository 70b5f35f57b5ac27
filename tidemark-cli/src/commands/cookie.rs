//! `tidemark cookie` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use tidemark_core::capability::{Clock, SystemClock};
use tidemark_session::{Session, SessionStore, navigation_hash};

use crate::cli::{CookieAction, CookieArgs};
use crate::commands::load_config_or_default;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `cookie` command.
pub async fn execute(
    args: CookieArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        CookieAction::Decode { value, now_ms } => {
            let report = decode(&value, now_ms.unwrap_or_else(|| SystemClock.now_ms()))?;
            writer.render(&report)
        }
        CookieAction::Encode {
            start_ms,
            length,
            id,
            url,
            secure,
        } => {
            let config = load_config_or_default(config_path).await?;
            let store = SessionStore::new(&config.session);
            let request = EncodeRequest {
                start_ms: start_ms.unwrap_or_else(|| SystemClock.now_ms()),
                length,
                id,
                url,
                secure,
            };
            writer.render(&encode(&store, request))
        }
    }
}

/// Decode a raw cookie value and evaluate its expiry at `now_ms`.
fn decode(value: &str, now_ms: u64) -> Result<CookieReport, CliError> {
    let session = Session::decode(value)?;
    info!(session_id = %session.session_id, "decoded session cookie");
    Ok(CookieReport {
        expired: session.is_expired(now_ms),
        session_id: session.session_id,
        session_start_ms: session.session_start,
        session_length: session.session_length,
        session_expiry_secs: session.session_expiry,
        referrer_hash: session.referrer_hash,
        navigation_hash: session.navigation_hash,
    })
}

struct EncodeRequest {
    start_ms: u64,
    length: u32,
    id: Option<String>,
    url: Option<String>,
    secure: bool,
}

fn encode(store: &SessionStore, request: EncodeRequest) -> EncodedCookie {
    let mut session = Session::mint(request.start_ms, store.expiry_secs());
    if let Some(id) = request.id {
        session.session_id = id;
    }
    session.session_length = request.length;
    session.navigation_hash = request.url.as_deref().map(navigation_hash);

    EncodedCookie {
        name: store.cookie_name().to_owned(),
        value: session.encode(),
        cookie: store.cookie_string(&session, request.secure),
    }
}

/// Decoded session cookie.
#[derive(Debug, Serialize)]
pub struct CookieReport {
    pub session_id: String,
    pub session_start_ms: u64,
    pub session_length: u32,
    pub session_expiry_secs: u64,
    pub expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_hash: Option<String>,
}

impl Render for CookieReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Session: {}", self.session_id.bold())?;
        writeln!(w, "  Start:   {} ms", self.session_start_ms)?;
        writeln!(w, "  Length:  {}", self.session_length)?;
        let state = if self.expired {
            "expired".red()
        } else {
            "active".green()
        };
        writeln!(w, "  Expiry:  {} s ({})", self.session_expiry_secs, state)?;
        if let Some(ref r) = self.referrer_hash {
            writeln!(w, "  Referrer hash:   {r}")?;
        }
        if let Some(ref nu) = self.navigation_hash {
            writeln!(w, "  Navigation hash: {nu}")?;
        }
        Ok(())
    }
}

/// Encoded session cookie.
#[derive(Debug, Serialize)]
pub struct EncodedCookie {
    pub name: String,
    pub value: String,
    pub cookie: String,
}

impl Render for EncodedCookie {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", self.cookie)
    }
}
