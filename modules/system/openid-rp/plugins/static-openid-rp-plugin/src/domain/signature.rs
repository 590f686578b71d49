//! Shared-secret signatures and response nonces.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use openid_rp_sdk::protocol::keys;
use openid_rp_sdk::{Parameters, VerificationFailure};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

type HmacSha256 = Hmac<Sha256>;

/// `field:value\n` for every signed field, in the order they are listed.
fn key_value_form<S: AsRef<str>>(
    params: &Parameters,
    signed: &[S],
) -> Result<String, VerificationFailure> {
    let mut form = String::new();
    for field in signed {
        let field = field.as_ref();
        let value = params
            .get(&format!("{}{field}", keys::PREFIX))
            .ok_or_else(|| VerificationFailure::rejected(format!("signed field '{field}' is missing")))?;
        form.push_str(field);
        form.push(':');
        form.push_str(value);
        form.push('\n');
    }
    Ok(form)
}

fn compute<S: AsRef<str>>(
    secret: &[u8],
    params: &Parameters,
    signed: &[S],
) -> Result<String, VerificationFailure> {
    let form = key_value_form(params, signed)?;
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| VerificationFailure::rejected(format!("unusable association secret: {e}")))?;
    mac.update(form.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Check `sig` against the signed fields of `params`.
///
/// # Errors
///
/// [`VerificationFailure::SignatureMismatch`] if the signature differs,
/// [`VerificationFailure::Rejected`] if a signed field is absent.
pub fn verify<S: AsRef<str>>(
    secret: &[u8],
    params: &Parameters,
    signed: &[S],
    sig: &str,
) -> Result<(), VerificationFailure> {
    let expected = compute(secret, params, signed)?;
    if bool::from(expected.as_bytes().ct_eq(sig.as_bytes())) {
        Ok(())
    } else {
        Err(VerificationFailure::SignatureMismatch)
    }
}

/// Sign `fields` of `params`, setting `openid.signed` and `openid.sig`.
///
/// # Errors
///
/// Returns [`VerificationFailure::Rejected`] if one of `fields` is not in
/// `params`.
pub fn sign_parameters(
    params: &mut Parameters,
    fields: &[&str],
    secret: &[u8],
) -> Result<(), VerificationFailure> {
    let sig = compute(secret, params, fields)?;
    params.insert(keys::SIGNED.to_owned(), fields.join(","));
    params.insert(keys::SIG.to_owned(), sig);
    Ok(())
}

/// A response nonce issued now: a second-precision UTC timestamp followed
/// by `suffix`.
///
/// # Errors
///
/// Returns an error if the timestamp cannot be formatted.
pub fn response_nonce(suffix: &str) -> Result<String, time::error::Format> {
    response_nonce_at(OffsetDateTime::now_utc(), suffix)
}

/// A response nonce issued at `issued`.
///
/// # Errors
///
/// Returns an error if the timestamp cannot be formatted.
pub fn response_nonce_at(
    issued: OffsetDateTime,
    suffix: &str,
) -> Result<String, time::error::Format> {
    let issued = issued.replace_nanosecond(0).unwrap_or(issued);
    Ok(format!("{}{suffix}", issued.format(&Rfc3339)?))
}

/// Timestamp a response nonce was issued at.
///
/// # Errors
///
/// Returns [`VerificationFailure::InvalidNonce`] if the nonce does not start
/// with an RFC 3339 UTC timestamp.
pub fn nonce_timestamp(nonce: &str) -> Result<OffsetDateTime, VerificationFailure> {
    let end = nonce
        .find('Z')
        .ok_or_else(|| VerificationFailure::InvalidNonce(format!("'{nonce}' has no timestamp")))?;
    OffsetDateTime::parse(&nonce[..=end], &Rfc3339)
        .map_err(|e| VerificationFailure::InvalidNonce(format!("'{nonce}': {e}")))
}
