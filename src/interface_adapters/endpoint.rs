// Room endpoint: `<ws|wss>://<host>[/base]/ws/<ROOMID>?name=<encoded name>`.

use crate::interface_adapters::sync_client::TransportError;
use url::Url;

pub const DEFAULT_PARTICIPANT_NAME: &str = "Player";

/// Room ids are case-insensitive; the room service keys them upper-case.
pub fn normalize_room_id(room_id: &str) -> String {
    room_id.trim().to_uppercase()
}

pub fn normalize_participant_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        DEFAULT_PARTICIPANT_NAME.to_string()
    } else {
        name.to_string()
    }
}

fn encode_component(value: &str) -> String {
    // Form encoding writes spaces as '+'; literal '+' is already escaped as %2B.
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Builds the WebSocket URL for a room from the configured service base URL.
pub fn room_endpoint(base: &str, room_id: &str, name: &str) -> Result<Url, TransportError> {
    let mut url = Url::parse(base.trim()).map_err(TransportError::Endpoint)?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(TransportError::UnsupportedScheme(other.to_string())),
    };
    if url.set_scheme(scheme).is_err() {
        return Err(TransportError::UnsupportedScheme(url.scheme().to_string()));
    }

    let base_path = url.path().trim_end_matches('/').to_string();
    url.set_path(&base_path);
    url.path_segments_mut()
        .map_err(|_| TransportError::UnsupportedScheme(scheme.to_string()))?
        .pop_if_empty()
        .push("ws")
        .push(&normalize_room_id(room_id));

    let query = format!(
        "name={}",
        encode_component(&normalize_participant_name(name))
    );
    url.set_query(Some(&query));
    url.set_fragment(None);

    Ok(url)
}
