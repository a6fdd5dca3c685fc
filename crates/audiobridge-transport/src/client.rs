//! RTSP client implementation.

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, instrument, trace};
use url::Url;

use crate::error::TransportError;
use crate::message::{read_response, Request, Response, CSEQ_HEADER};
use crate::{TransportResult, DEFAULT_RTSP_PORT, USER_AGENT, USER_AGENT_HEADER};

/// An RTSP client on one TCP connection.
///
/// Every request gets the next `CSeq`. The counter starts at 1 and moves
/// forward once per [`send`](Self::send) whether or not the exchange
/// succeeds; it is never reset while the connection lives.
pub struct RtspClient {
    stream: BufReader<TcpStream>,
    seq: u64,
}

impl RtspClient {
    /// Connect to `address:port`.
    #[instrument(name = "rtsp_connect")]
    pub async fn connect(address: &str, port: u16) -> TransportResult<Self> {
        debug!("Connecting to RTSP server");

        let stream = TcpStream::connect((address, port))
            .await
            .map_err(|e| TransportError::Connection(format!("{}:{}: {}", address, port, e)))?;

        // Requests are small and latency matters more than throughput.
        stream.set_nodelay(true).map_err(TransportError::Io)?;

        debug!("RTSP connection established");
        Ok(Self {
            stream: BufReader::new(stream),
            seq: 1,
        })
    }

    /// Connect to an `rtsp://host[:port]` URL.
    pub async fn connect_url(url: &str) -> TransportResult<Self> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        if parsed.scheme() != "rtsp" {
            return Err(TransportError::InvalidUrl(
                "URL must start with rtsp://".to_string(),
            ));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| TransportError::InvalidUrl("Missing host".to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port = parsed.port().unwrap_or(DEFAULT_RTSP_PORT);

        Self::connect(host, port).await
    }

    /// Send a request and wait for its response.
    ///
    /// `CSeq` and the user agent header are set on `request` before it is
    /// written, so the caller can see what was sent.
    pub async fn send(&mut self, request: &mut Request) -> TransportResult<Response> {
        request.set_header(CSEQ_HEADER, self.seq.to_string());
        request.set_header(USER_AGENT_HEADER, USER_AGENT);
        self.seq += 1;

        trace!(method = %request.method, uri = %request.uri, "Sending RTSP request");

        let bytes = request.encode();
        self.stream
            .write_all(&bytes)
            .await
            .map_err(|e| TransportError::Transport(format!("write failed: {}", e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| TransportError::Transport(format!("flush failed: {}", e)))?;

        let response = read_response(&mut self.stream).await?;
        trace!(status = response.status, "Received RTSP response");
        Ok(response)
    }

    /// The sequence number the next request will carry.
    pub fn next_seq(&self) -> u64 {
        self.seq
    }

    /// IP of our end of the connection.
    pub fn local_address(&self) -> TransportResult<String> {
        let addr = self.stream.get_ref().local_addr()?;
        Ok(addr.ip().to_string())
    }

    /// IP of the server end of the connection.
    pub fn remote_address(&self) -> TransportResult<String> {
        let addr = self.stream.get_ref().peer_addr()?;
        Ok(addr.ip().to_string())
    }

    /// Shut the connection down.
    pub async fn close(self) -> TransportResult<()> {
        let mut stream = self.stream.into_inner();
        stream.shutdown().await.map_err(TransportError::Io)
    }
}
