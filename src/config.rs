use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::client::ClientConfig;

pub(crate) const DEFAULT_URL: &str = "https://api.researchmap.jp";
pub(crate) const DEFAULT_PERMALINK: &str = "t_yamane";

#[derive(Debug, Default, PartialEq)]
struct RcConfig {
    url: Option<String>,
    permalink: Option<String>,
    verify: Option<bool>,
}

pub(crate) fn load_config(
    url: Option<String>,
    permalink: Option<String>,
    verify: Option<bool>,
) -> Result<ClientConfig> {
    resolve_config(
        url,
        permalink,
        verify,
        |name| std::env::var(name).ok(),
        &rc_candidates(),
    )
}

fn resolve_config<E>(
    url: Option<String>,
    permalink: Option<String>,
    verify: Option<bool>,
    env: E,
    rc_candidates: &[PathBuf],
) -> Result<ClientConfig>
where
    E: Fn(&str) -> Option<String>,
{
    let mut url = url.or_else(|| env("RESEARCHMAP_URL"));
    let mut permalink = permalink.or_else(|| env("RESEARCHMAP_PERMALINK"));
    let mut file_verify: Option<bool> = None;

    if url.is_none() || permalink.is_none() || verify.is_none() {
        for rc_path in rc_candidates {
            if rc_path.exists() {
                let cfg = read_rc(rc_path).with_context(|| {
                    format!("failed to read configuration file {}", rc_path.display())
                })?;
                tracing::debug!(path = %rc_path.display(), "loaded configuration file");

                if url.is_none() {
                    url = cfg.url;
                }
                if permalink.is_none() {
                    permalink = cfg.permalink;
                }
                file_verify = cfg.verify;
                break;
            }
        }
    }

    let url = url.unwrap_or_else(|| DEFAULT_URL.to_string());
    let permalink = permalink.unwrap_or_else(|| DEFAULT_PERMALINK.to_string());
    if permalink.trim().trim_matches('/').is_empty() {
        bail!("Invalid configuration: permalink is empty");
    }
    let verify = verify.or(file_verify).unwrap_or(true);

    Ok(ClientConfig {
        url,
        permalink: permalink.trim().to_string(),
        verify,
    })
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    // A key may be left bare with its value on the following line.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let entry = split_entry(line);

        if let Some(pk) = pending_key.take() {
            // Anything that is not itself a known key is the pending value,
            // colons included (`https://...`).
            if entry.is_none() {
                let v = strip_quotes(line).to_string();
                match pk {
                    "url" => cfg.url = Some(v),
                    "permalink" => cfg.permalink = Some(v),
                    _ => {}
                }
                continue;
            }
        }

        let Some((k, v)) = entry else {
            continue;
        };
        match k {
            "url" | "permalink" if v.is_empty() => pending_key = Some(k),
            "url" => cfg.url = Some(v.to_string()),
            "permalink" => cfg.permalink = Some(v.to_string()),
            "verify" if !v.is_empty() => {
                cfg.verify = Some(!matches!(v, "0" | "false" | "no"));
            }
            _ => {}
        }
    }

    cfg
}

const RC_KEYS: [&str; 3] = ["url", "permalink", "verify"];

/// Splits `key: value` on the first colon when `key` is one we understand.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let (k, v) = line.split_once(':')?;
    let k = k.trim();
    RC_KEYS.contains(&k).then(|| (k, strip_quotes(v)))
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    ['"', '\'']
        .into_iter()
        .find_map(|q| s.strip_prefix(q).and_then(|rest| rest.strip_suffix(q)))
        .unwrap_or(s)
}

/// `RESEARCHMAP_RC` alone when set, else `.researchmaprc` in the working
/// directory followed by the one in the home directory.
fn rc_candidates() -> Vec<PathBuf> {
    if let Ok(p) = std::env::var("RESEARCHMAP_RC") {
        return vec![PathBuf::from(p)];
    }

    let cwd = std::env::current_dir().ok();
    cwd.into_iter()
        .chain(dirs::home_dir())
        .map(|dir| dir.join(".researchmaprc"))
        .collect()
}
