//! Self-signed CA + wildcard leaf certificate minting (spec.md §6
//! "Persisted state"), replacing the original's
//! `certauth.certauth.CertificateAuthority` (`ssl_key.py`). Grounded on
//! `rcgen`'s `Issuer` API as used in
//! `examples/other_examples/...tensorzero-tensorzero__provider-proxy-src-lib.rs.rs`.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Context;
use rcgen::{
    CertificateParams, DistinguishedName, DnType, DnValue, Issuer, IsCa, BasicConstraints,
    KeyPair, KeyUsagePurpose,
};

/// CA validity period (spec.md §6: "valid for 364 days").
const CA_VALIDITY: Duration = Duration::from_secs(364 * 24 * 60 * 60);

const CA_CERT_FILE: &str = "ca.pem";
const CA_KEY_FILE: &str = "ca-key.pem";

pub struct TlsMaterial {
    /// PEM-encoded leaf certificate chain (leaf + CA), ready for
    /// `axum_server::tls_rustls::RustlsConfig::from_pem`.
    pub cert_pem: String,
    pub key_pem: String,
}

/// Loads the CA from `config_dir` (minting + persisting a fresh one if
/// absent or past its `CA_VALIDITY` window), then mints a wildcard leaf
/// certificate for `*.{base_url}` signed by it.
///
/// Mirrors `ssl_key.py::create_keys`: `CertificateAuthority(...).get_wildcard_cert('*.' + common_name)`.
pub fn load_or_mint(config_dir: &Path, base_url: &str) -> anyhow::Result<TlsMaterial> {
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating TLS state dir {}", config_dir.display()))?;

    let (ca_cert_pem, ca_key_pem, minted_fresh) = load_or_create_ca(config_dir)?;
    if minted_fresh {
        tracing::warn!(
            dir = %config_dir.display(),
            "minted a new Riptide Proxy CA — re-import {} into your browser/OS trust store",
            config_dir.join(CA_CERT_FILE).display()
        );
    }

    let ca_key_pair = KeyPair::from_pem(&ca_key_pem).context("parsing persisted CA key")?;
    let ca_params =
        CertificateParams::from_ca_cert_pem(&ca_cert_pem).context("parsing persisted CA cert")?;
    let issuer = Issuer::new(ca_params, ca_key_pair);

    let leaf_key = KeyPair::generate().context("generating leaf key pair")?;
    let mut leaf_params = CertificateParams::new(vec![format!("*.{base_url}")])
        .context("building leaf certificate params")?;
    leaf_params.distinguished_name = common_name_dn(&format!("*.{base_url}"));
    let leaf_cert = leaf_params
        .signed_by(&leaf_key, &issuer)
        .context("signing leaf certificate with Riptide Proxy CA")?;

    Ok(TlsMaterial {
        cert_pem: format!("{}\n{}", leaf_cert.pem(), ca_cert_pem),
        key_pem: leaf_key.serialize_pem(),
    })
}

fn load_or_create_ca(config_dir: &Path) -> anyhow::Result<(String, String, bool)> {
    let cert_path = config_dir.join(CA_CERT_FILE);
    let key_path = config_dir.join(CA_KEY_FILE);
    let expiry_marker = config_dir.join("ca.expires_at");

    if cert_path.is_file() && key_path.is_file() && !ca_is_expired(&expiry_marker) {
        let cert_pem = std::fs::read_to_string(&cert_path)?;
        let key_pem = std::fs::read_to_string(&key_path)?;
        return Ok((cert_pem, key_pem, false));
    }

    let (cert_pem, key_pem) = mint_ca(&cert_path.to_string_lossy())?;
    std::fs::write(&cert_path, &cert_pem)?;
    std::fs::write(&key_path, &key_pem)?;

    let valid_until = SystemTime::now() + CA_VALIDITY;
    let epoch = valid_until
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    std::fs::write(&expiry_marker, epoch.to_string())?;

    Ok((cert_pem, key_pem, true))
}

fn ca_is_expired(expiry_marker: &Path) -> bool {
    let Ok(raw) = std::fs::read_to_string(expiry_marker) else {
        return true;
    };
    let Ok(valid_until_epoch) = raw.trim().parse::<u64>() else {
        return true;
    };
    let now_epoch = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now_epoch >= valid_until_epoch
}

fn mint_ca(common_name_hint: &str) -> anyhow::Result<(String, String)> {
    let hostname = local_hostname();

    let mut params = CertificateParams::default();
    params.distinguished_name = common_name_dn(&format!("Riptide Proxy CA for {hostname}"));
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];

    let key_pair = KeyPair::generate().context("generating CA key pair")?;
    let cert = params
        .self_signed(&key_pair)
        .with_context(|| format!("self-signing CA for {common_name_hint}"))?;

    Ok((cert.pem(), key_pair.serialize_pem()))
}

fn common_name_dn(name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(name.to_string()));
    dn
}

/// Directory under the user's config root Riptide Proxy's CA state lives
/// in (spec.md §6), mirroring `ssl_key.py::get_config_dir`
/// (`<riptide_config_dir>/riptide_proxy`).
pub fn default_config_dir() -> PathBuf {
    let base = dirs_config_dir();
    base.join("riptide_proxy")
}

/// Best-effort local hostname, used only to decorate the CA's common
/// name (spec.md leaves this cosmetic; `ssl_key.py` uses
/// `socket.gethostname()` for the same purpose).
fn local_hostname() -> String {
    let mut buf = [0u8; 256];
    let ret = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if ret != 0 {
        return "localhost".to_string();
    }
    let nul = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..nul]).into_owned()
}

fn dirs_config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config");
    }
    std::env::temp_dir()
}
