use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use ratcompose_content::parse_draft;
use ratcompose_core::{AttachedMessage, BodyPart, Envelope, SecurityFlags, log_debug};
use ratcompose_engine::{AttachmentNode, AttachmentTree, ComposeOutcome, ComposeResult, ComposeSession};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

pub(crate) const CLI_SCHEMA_VERSION: &str = "ratcompose.cli.v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AttachedRecord {
    pub(crate) subject: String,
    pub(crate) from: String,
    /// Base64 of the full message.
    pub(crate) raw: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PartRecord {
    pub(crate) level: usize,
    #[serde(default)]
    pub(crate) unowned: bool,
    #[serde(flatten)]
    pub(crate) part: BodyPart,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) attached: Option<AttachedRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SessionRecord {
    pub(crate) outcome: String,
    pub(crate) envelope: Envelope,
    pub(crate) security: SecurityFlags,
    #[serde(default)]
    pub(crate) security_names: String,
    pub(crate) fcc: Option<String>,
    #[serde(default)]
    pub(crate) news: bool,
    #[serde(default)]
    pub(crate) saved_at: String,
    pub(crate) parts: Vec<PartRecord>,
}

pub(crate) fn outcome_name(outcome: ComposeOutcome) -> &'static str {
    match outcome {
        ComposeOutcome::Send => "send",
        ComposeOutcome::Abort => "abort",
        ComposeOutcome::Postpone => "postpone",
    }
}

pub(crate) fn session_record(outcome: ComposeOutcome, session: &ComposeSession) -> SessionRecord {
    let parts = session
        .tree
        .iter()
        .map(|node| PartRecord {
            level: node.level,
            unowned: node.unowned,
            part: node.body.clone(),
            attached: node.body.message.as_ref().map(|msg| AttachedRecord {
                subject: msg.subject.clone(),
                from: msg.from.clone(),
                raw: BASE64_STANDARD.encode(&msg.raw),
            }),
        })
        .collect();
    SessionRecord {
        outcome: outcome_name(outcome).to_string(),
        envelope: session.envelope.clone(),
        security: session.security,
        security_names: session.security.to_string(),
        fcc: session.envelope.fcc.clone(),
        news: session.news,
        saved_at: chrono::Local::now().to_rfc3339(),
        parts,
    }
}

pub(crate) fn restore_session(record: SessionRecord) -> Result<ComposeSession> {
    let mut tree = AttachmentTree::new();
    for entry in record.parts {
        let mut part = entry.part;
        if let Some(attached) = entry.attached {
            let raw = BASE64_STANDARD
                .decode(attached.raw.as_bytes())
                .map_err(|e| anyhow!("Bad attached message in draft: {}", e))?;
            part.message = Some(Arc::new(AttachedMessage {
                subject: attached.subject,
                from: attached.from,
                raw,
            }));
        }
        let mut node = AttachmentNode::new(part).with_level(entry.level);
        node.unowned = entry.unowned;
        let at = tree.len();
        tree.insert_at(node, at);
    }
    Ok(ComposeSession {
        envelope: record.envelope,
        tree,
        security: record.security,
        news: record.news,
    })
}

pub(crate) fn document(result: JsonValue) -> JsonValue {
    json!({
        "schema": CLI_SCHEMA_VERSION,
        "ok": true,
        "result": result
    })
}

pub(crate) fn error_document(message: &str) -> JsonValue {
    json!({
        "schema": CLI_SCHEMA_VERSION,
        "ok": false,
        "error": message
    })
}

pub(crate) fn write_output(doc: &JsonValue, out: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(doc)?;
    match out {
        Some(path) => std::fs::write(path, format!("{}\n", text))
            .map_err(|e| anyhow!("Can't write {}: {}", path.display(), e)),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

pub(crate) fn drafts_dir() -> PathBuf {
    ratcompose_core::xdg_state_dir()
        .join("ratcompose")
        .join("drafts")
}

pub(crate) fn save_draft(dir: &Path, record: &SessionRecord) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stem = chrono::Local::now().format("draft-%Y%m%d-%H%M%S").to_string();
    let mut path = dir.join(format!("{}.json", stem));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}-{}.json", stem, n));
        n += 1;
    }
    write_output(&document(serde_json::to_value(record)?), Some(&path))?;
    log_debug(&format!("draft saved {}", path.display()));
    Ok(path)
}

/// Reads a postponed JSON draft, or falls back to parsing a raw message.
pub(crate) fn load_draft(path: &Path, spool_dir: &Path) -> Result<ComposeSession> {
    let raw = std::fs::read(path).map_err(|e| anyhow!("Can't read {}: {}", path.display(), e))?;
    let looks_json = raw
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .map(|b| *b == b'{')
        .unwrap_or(false);
    if looks_json {
        let doc: JsonValue = serde_json::from_slice(&raw)?;
        let schema = doc.get("schema").and_then(|v| v.as_str()).unwrap_or("");
        if schema != CLI_SCHEMA_VERSION {
            return Err(anyhow!("Unsupported draft schema '{}'", schema));
        }
        let result = doc
            .get("result")
            .cloned()
            .ok_or_else(|| anyhow!("Draft {} has no result", path.display()))?;
        let record: SessionRecord = serde_json::from_value(result)?;
        return restore_session(record);
    }
    let draft = parse_draft(&raw, spool_dir)?;
    let news = draft.envelope.newsgroups.is_some();
    Ok(ComposeSession {
        envelope: draft.envelope,
        tree: AttachmentTree::from_bodies(draft.body),
        security: SecurityFlags::empty(),
        news,
    })
}

/// Hands the finished session on and returns the process exit code.
pub(crate) fn finish(result: &ComposeResult, out: Option<&Path>, drafts: &Path) -> Result<i32> {
    let record = session_record(result.outcome, &result.session);
    match result.outcome {
        ComposeOutcome::Send => {
            write_output(&document(serde_json::to_value(&record)?), out)?;
            Ok(0)
        }
        ComposeOutcome::Postpone => {
            let path = save_draft(drafts, &record)?;
            write_output(
                &document(json!({
                    "outcome": record.outcome,
                    "draft": path.display().to_string()
                })),
                None,
            )?;
            Ok(0)
        }
        ComposeOutcome::Abort => {
            write_output(&error_document("Message aborted"), None)?;
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use anyhow::Result;
    use ratcompose_core::{AttachedMessage, BodyPart, ContentKind, Envelope, SecurityFlags};
    use ratcompose_engine::{
        AttachmentNode, AttachmentTree, ComposeOutcome, ComposeResult, ComposeSession,
    };
    use tempfile::TempDir;

    use super::{
        CLI_SCHEMA_VERSION, finish, load_draft, restore_session, save_draft, session_record,
    };

    fn session() -> ComposeSession {
        let mut tree = AttachmentTree::new();
        let mut body = BodyPart::new(ContentKind::Text, "plain");
        body.filename = Some(PathBuf::from("/tmp/body.txt"));
        tree.add(AttachmentNode::new(body));
        tree.add(AttachmentNode::new(BodyPart::container("alternative")));
        let mut html = AttachmentNode::new(BodyPart::new(ContentKind::Text, "html")).with_level(1);
        html.unowned = true;
        tree.insert_at(html, 2);
        let message = Arc::new(AttachedMessage {
            subject: "Minutes".to_string(),
            from: "carol@z.org".to_string(),
            raw: b"Subject: Minutes\r\n\r\nok\r\n".to_vec(),
        });
        tree.insert_at(AttachmentNode::new(BodyPart::message(message)), 3);
        ComposeSession {
            envelope: Envelope {
                to: vec!["alice@x.com".to_string()],
                subject: Some("Plans".to_string()),
                fcc: Some("~/sent".to_string()),
                ..Envelope::default()
            },
            tree,
            security: SecurityFlags::SIGN | SecurityFlags::PGP,
            news: false,
        }
    }

    #[test]
    fn record_restores_levels_ownership_and_messages() -> Result<()> {
        let record = session_record(ComposeOutcome::Postpone, &session());
        assert_eq!(record.outcome, "postpone");
        assert_eq!(record.fcc.as_deref(), Some("~/sent"));
        let json = serde_json::to_value(&record)?;
        assert_eq!(json["parts"][1]["subtype"], "alternative");
        assert!(json["parts"][0].get("attached").is_none());

        let restored = restore_session(serde_json::from_value(json)?)?;
        let levels: Vec<usize> = restored.tree.iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![0, 0, 1, 0]);
        assert!(restored.tree.get(2).map(|n| n.unowned).unwrap_or(false));
        let msg = restored
            .tree
            .get(3)
            .and_then(|n| n.body.message.clone())
            .expect("message");
        assert_eq!(msg.subject, "Minutes");
        assert_eq!(msg.raw, b"Subject: Minutes\r\n\r\nok\r\n".to_vec());
        assert_eq!(restored.security, SecurityFlags::SIGN | SecurityFlags::PGP);
        assert_eq!(restored.envelope.subject.as_deref(), Some("Plans"));
        Ok(())
    }

    #[test]
    fn saved_draft_loads_back() -> Result<()> {
        let dir = TempDir::new()?;
        let record = session_record(ComposeOutcome::Postpone, &session());
        let path = save_draft(dir.path(), &record)?;
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        assert!(name.starts_with("draft-") && name.ends_with(".json"));
        let second = save_draft(dir.path(), &record)?;
        assert_ne!(path, second);

        let text = std::fs::read_to_string(&path)?;
        assert!(text.contains(CLI_SCHEMA_VERSION));
        let loaded = load_draft(&path, dir.path())?;
        assert_eq!(loaded.tree.len(), 4);
        assert_eq!(loaded.envelope.to, vec!["alice@x.com"]);
        Ok(())
    }

    #[test]
    fn foreign_schema_is_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("other.json");
        std::fs::write(&path, r#"{"schema":"mailer.cli.v2","ok":true,"result":{}}"#)?;
        let err = load_draft(&path, dir.path()).err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("Unsupported draft schema 'mailer.cli.v2'"));
        Ok(())
    }

    #[test]
    fn raw_article_resumes_in_news_mode() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("article.eml");
        std::fs::write(
            &path,
            "From: me@x.com\r\nNewsgroups: comp.lang.rust\r\nSubject: Borrowck\r\n\r\nquestion\r\n",
        )?;
        let session = load_draft(&path, dir.path())?;
        assert!(session.news);
        assert_eq!(session.envelope.subject.as_deref(), Some("Borrowck"));
        assert_eq!(session.tree.len(), 1);
        Ok(())
    }

    #[test]
    fn send_writes_output_and_abort_exits_one() -> Result<()> {
        let dir = TempDir::new()?;
        let out = dir.path().join("out.json");
        let sent = ComposeResult {
            outcome: ComposeOutcome::Send,
            session: session(),
        };
        assert_eq!(finish(&sent, Some(&out), dir.path())?, 0);
        let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out)?)?;
        assert_eq!(doc["ok"], true);
        assert_eq!(doc["result"]["outcome"], "send");
        assert_eq!(doc["result"]["security_names"], "sign|pgp");

        let aborted = ComposeResult {
            outcome: ComposeOutcome::Abort,
            session: ComposeSession::default(),
        };
        assert_eq!(finish(&aborted, None, dir.path())?, 1);
        Ok(())
    }
}
