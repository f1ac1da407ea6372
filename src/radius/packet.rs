//! Minimal RFC 2865 codec: Access-Request encoding and reply validation.
//!
//! Only the attributes this gateway sends are implemented: User-Name(1),
//! User-Password(2) and NAS-Identifier(32).

use anyhow::{bail, Result};
use md5::{Digest, Md5};

pub(crate) const ACCESS_REQUEST: u8 = 1;
pub(crate) const ACCESS_ACCEPT: u8 = 2;
#[cfg(test)]
pub(crate) const ACCESS_REJECT: u8 = 3;

const ATTR_USER_NAME: u8 = 1;
const ATTR_USER_PASSWORD: u8 = 2;
const ATTR_NAS_IDENTIFIER: u8 = 32;

const HEADER_LEN: usize = 20;
const MAX_PACKET_LEN: usize = 4096;
const MAX_ATTR_LEN: usize = 253;
const MAX_PASSWORD_LEN: usize = 128;

/// Encode an Access-Request carrying username, hidden password and the
/// NAS-Identifier.
///
/// # Errors
/// Returns an error if any attribute value is out of the ranges RFC 2865
/// allows.
pub(crate) fn encode_access_request(
    identifier: u8,
    authenticator: &[u8; 16],
    username: &str,
    password: &str,
    nas_identifier: &str,
    secret: &[u8],
) -> Result<Vec<u8>> {
    let hidden = encode_user_password(password.as_bytes(), secret, authenticator)?;

    let mut attrs = Vec::new();
    push_attribute(&mut attrs, ATTR_USER_NAME, username.as_bytes())?;
    push_attribute(&mut attrs, ATTR_USER_PASSWORD, &hidden)?;
    push_attribute(&mut attrs, ATTR_NAS_IDENTIFIER, nas_identifier.as_bytes())?;

    let length = HEADER_LEN + attrs.len();
    if length > MAX_PACKET_LEN {
        bail!("request packet length {length} exceeds {MAX_PACKET_LEN} octets");
    }

    let mut packet = Vec::with_capacity(length);
    packet.push(ACCESS_REQUEST);
    packet.push(identifier);
    packet.extend_from_slice(&u16::try_from(length)?.to_be_bytes());
    packet.extend_from_slice(authenticator);
    packet.extend_from_slice(&attrs);
    Ok(packet)
}

fn push_attribute(out: &mut Vec<u8>, kind: u8, value: &[u8]) -> Result<()> {
    if value.is_empty() || value.len() > MAX_ATTR_LEN {
        bail!(
            "attribute {kind} value length {} is out of range 1..={MAX_ATTR_LEN}",
            value.len()
        );
    }
    out.push(kind);
    out.push(u8::try_from(value.len() + 2)?);
    out.extend_from_slice(value);
    Ok(())
}

/// Hide a password per RFC 2865 §5.2: pad to a 16-octet multiple, then XOR
/// each block with MD5(secret + previous block), seeded with the request
/// authenticator.
pub(crate) fn encode_user_password(
    password: &[u8],
    secret: &[u8],
    authenticator: &[u8; 16],
) -> Result<Vec<u8>> {
    if password.len() > MAX_PASSWORD_LEN {
        bail!(
            "password length {} exceeds {MAX_PASSWORD_LEN} octets",
            password.len()
        );
    }

    let padded_len = password.len().max(1).div_ceil(16) * 16;
    let mut padded = password.to_vec();
    padded.resize(padded_len, 0);

    let mut out = Vec::with_capacity(padded_len);
    let mut prev: [u8; 16] = *authenticator;
    for chunk in padded.chunks_exact(16) {
        let mut hasher = Md5::new();
        hasher.update(secret);
        hasher.update(prev);
        let digest = hasher.finalize();
        for (i, octet) in chunk.iter().enumerate() {
            prev[i] = octet ^ digest[i];
        }
        out.extend_from_slice(&prev);
    }
    Ok(out)
}

/// Validate a reply against the request it answers and return its code.
///
/// # Errors
/// Returns an error for truncated packets, identifier mismatches, and
/// replies failing response-authenticator validation; the caller treats all
/// of these as a transport failure of the endpoint.
pub(crate) fn decode_reply(
    reply: &[u8],
    identifier: u8,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> Result<u8> {
    if reply.len() < HEADER_LEN {
        bail!("reply shorter than the RADIUS header");
    }
    let code = reply[0];
    let length = usize::from(u16::from_be_bytes([reply[2], reply[3]]));
    if length < HEADER_LEN || length > reply.len() {
        bail!("reply length field {length} is inconsistent with datagram size");
    }
    if reply[1] != identifier {
        bail!(
            "reply identifier {} does not match request identifier {identifier}",
            reply[1]
        );
    }

    let mut hasher = Md5::new();
    hasher.update(&reply[0..4]);
    hasher.update(request_authenticator);
    hasher.update(&reply[HEADER_LEN..length]);
    hasher.update(secret);
    if hasher.finalize().as_slice() != &reply[4..HEADER_LEN] {
        bail!("reply failed response-authenticator validation");
    }

    Ok(code)
}

/// Identifier and authenticator of a received Access-Request, enough for a
/// test server to answer it.
#[cfg(test)]
pub(crate) struct RequestHeader {
    pub(crate) code: u8,
    pub(crate) identifier: u8,
    pub(crate) authenticator: [u8; 16],
}

#[cfg(test)]
pub(crate) fn parse_request_header(request: &[u8]) -> Result<RequestHeader> {
    if request.len() < HEADER_LEN {
        bail!("request shorter than the RADIUS header");
    }
    let mut authenticator = [0u8; 16];
    authenticator.copy_from_slice(&request[4..HEADER_LEN]);
    Ok(RequestHeader {
        code: request[0],
        identifier: request[1],
        authenticator,
    })
}

/// Build an attribute-less reply with a valid response authenticator.
#[cfg(test)]
pub(crate) fn encode_reply(
    code: u8,
    identifier: u8,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> Vec<u8> {
    let mut packet = vec![code, identifier];
    packet.extend_from_slice(&(HEADER_LEN as u16).to_be_bytes());

    let mut hasher = Md5::new();
    hasher.update(&packet);
    hasher.update(request_authenticator);
    hasher.update(secret);
    packet.extend_from_slice(&hasher.finalize());
    packet
}
