use url::Url;

use crate::client_id::ClientId;
use crate::error::{NotifyError, Result};

/// WebSocket URL for `client_id` on the host serving `origin`
///
/// `http` maps to `ws` and `https` to `wss`; host and port are kept and the path becomes
/// `/ws/{client_id}`. Origins that are already `ws`/`wss` are accepted as-is.
pub fn socket_url(origin: &str, client_id: &ClientId) -> Result<Url> {
    let mut url = Url::parse(origin)?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(NotifyError::InvalidOrigin(format!(
                "unsupported scheme '{}' in {}",
                other, origin
            )))
        }
    };

    url.set_scheme(scheme)
        .map_err(|_| NotifyError::InvalidOrigin(origin.to_string()))?;
    url.set_path(&format!("/ws/{}", client_id));
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}
