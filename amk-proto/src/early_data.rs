//! Early data is the beginning of the client's stream sent along with the WebSocket handshake, in
//! the `Sec-WebSocket-Protocol` header, so the first request doesn't cost an extra round trip.
//!
//! It is base64 with the URL-safe characters `-` and `_` standing in for `+` and `/`. Padding is
//! optional, since clients usually strip it.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};

use crate::error::EarlyDataError;

const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decodes the early data carried by a handshake, if any.
///
/// An absent or blank value means there is no early data, which is not an error. Anything else
/// has to be valid base64 after mapping the URL-safe characters back to the standard alphabet.
pub fn decode_early_data(value: Option<&str>) -> Result<Option<Vec<u8>>, EarlyDataError> {
    let value = match value.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(None),
    };

    let standard = value.replace('-', "+").replace('_', "/");
    let decoded = FORGIVING.decode(standard)?;
    Ok((!decoded.is_empty()).then_some(decoded))
}
