use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use rustls::DigitallySignedStruct;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

/// Accepts any certificate. Only ever wired in when a caller explicitly
/// disables verification through `ClientConfig::tls_insecure_skip_verify`.
#[derive(Debug)]
struct NoCertificateVerification;

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}

pub enum TransportStream {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl TransportStream {
    /// The ALPN protocol the peer actually selected, if any. Only
    /// meaningful on a TLS transport; cleartext connections never run ALPN.
    pub fn negotiated_alpn(&self) -> Option<Vec<u8>> {
        match self {
            TransportStream::Tcp(_) => None,
            TransportStream::Tls(tls) => tls.get_ref().1.alpn_protocol().map(|p| p.to_vec()),
        }
    }

    pub fn into_split(self) -> (tokio::io::ReadHalf<Self>, tokio::io::WriteHalf<Self>) {
        tokio::io::split(self)
    }
}

impl AsyncRead for TransportStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TransportStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            TransportStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for TransportStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            TransportStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            TransportStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TransportStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            TransportStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TransportStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            TransportStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

pub async fn create_tcp_stream(host: &str, port: u16) -> io::Result<TransportStream> {
    let stream = TcpStream::connect((host, port)).await?;
    Ok(TransportStream::Tcp(stream))
}

fn default_root_store() -> rustls::RootCertStore {
    let mut store = rustls::RootCertStore::empty();
    store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    store
}

/// Connects and completes a TLS handshake, advertising the given ALPN
/// protocol list in preference order (e.g. `[b"h2", b"http/1.1"]`).
///
/// Certificate verification uses the Mozilla root set by default;
/// `insecure_skip_verify` exists only for talking to local test servers
/// with self-signed certificates and should never be set from untrusted
/// configuration.
pub async fn create_tls_stream_with_alpn(
    host: &str,
    port: u16,
    server_name: &str,
    alpn_protocols: &[&[u8]],
    insecure_skip_verify: bool,
) -> io::Result<TransportStream> {
    let tcp_stream = TcpStream::connect((host, port)).await?;

    let mut config = if insecure_skip_verify {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoCertificateVerification))
            .with_no_client_auth()
    } else {
        ClientConfig::builder()
            .with_root_certificates(default_root_store())
            .with_no_client_auth()
    };

    config.alpn_protocols = alpn_protocols.iter().map(|p| p.to_vec()).collect();

    let connector = TlsConnector::from(Arc::new(config));
    let server_name = ServerName::try_from(server_name.to_string())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid server name"))?;

    let tls_stream = connector.connect(server_name, tcp_stream).await?;
    Ok(TransportStream::Tls(Box::new(tls_stream)))
}

pub async fn create_tls_stream(host: &str, port: u16, server_name: &str) -> io::Result<TransportStream> {
    create_tls_stream_with_alpn(host, port, server_name, &[b"h2", b"http/1.1"], false).await
}

pub async fn create_h2_tls_stream(
    host: &str,
    port: u16,
    server_name: &str,
) -> io::Result<TransportStream> {
    create_tls_stream_with_alpn(host, port, server_name, &[b"h2"], false).await
}

/// Establishes the transport for a request target. `h2c` (cleartext HTTP/2
/// via prior knowledge) is represented by the `http` scheme, matching
/// `h2_prior_knowledge` in the protocol negotiator.
pub async fn create_stream(scheme: &str, host: &str, port: u16) -> io::Result<TransportStream> {
    match scheme {
        "http" => create_tcp_stream(host, port).await,
        "https" => create_tls_stream(host, port, host).await,
        "h2" => create_h2_tls_stream(host, port, host).await,
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported scheme: {}", scheme),
        )),
    }
}
