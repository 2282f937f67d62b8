//! Fragment request URLs.

use anyhow::{Context, Result};
use url::Url;

/// `<base><path>?img=<image>`, e.g. `http://host:2520/image?img=1`.
pub fn fragment_url(base: &str, path: &str, image: u32) -> Result<Url> {
    let base = Url::parse(base).with_context(|| format!("invalid server URL: {}", base))?;
    if !matches!(base.scheme(), "http" | "https") {
        anyhow::bail!("unsupported scheme in server URL: {}", base);
    }
    let mut url = base
        .join(path)
        .with_context(|| format!("invalid image path: {}", path))?;
    url.query_pairs_mut()
        .clear()
        .append_pair("img", &image.to_string());
    Ok(url)
}
