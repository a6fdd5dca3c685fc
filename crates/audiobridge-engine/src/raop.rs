//! Remote AirPlay receiver as a player client.
//!
//! Control parameters become `SET_PARAMETER` requests on an RTSP
//! connection driven by a small runtime owned by the client. PCM is
//! forwarded as datagrams on a separate data socket.

use std::io;
use std::net::UdpSocket;

use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use audiobridge_audio::{AudioError, AudioResult, ByteSink};
use audiobridge_codec::MUTED_VOLUME_DB;
use audiobridge_ipc::RaopClientConfig;
use audiobridge_transport::{Request, RtspClient};

use crate::client::{ControlParam, PlayerClient};
use crate::error::PlayerError;
use crate::PlayerResult;

/// Control parameters queued per client before new ones are refused.
pub const PARAM_QUEUE_CAPACITY: usize = 16;

const PARAMETERS_CONTENT_TYPE: &str = "text/parameters";
const DMAP_CONTENT_TYPE: &str = "application/x-dmap-tagged";
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// `volume: <dB>` body.
pub fn volume_body(db: f64) -> String {
    format!("volume: {:.6}\r\n", db)
}

fn dmap_item(out: &mut Vec<u8>, tag: &[u8; 4], value: &[u8]) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(value);
}

/// A DMAP `mlit` listing item with title, artist and album.
pub fn dmap_track_info(album: &str, artist: &str, title: &str) -> Vec<u8> {
    let mut items = Vec::new();
    dmap_item(&mut items, b"minm", title.as_bytes());
    dmap_item(&mut items, b"asar", artist.as_bytes());
    dmap_item(&mut items, b"asal", album.as_bytes());

    let mut out = Vec::with_capacity(items.len() + 8);
    dmap_item(&mut out, b"mlit", &items);
    out
}

/// PNG when the signature says so, JPEG otherwise.
pub fn artwork_content_type(artwork: &[u8]) -> &'static str {
    if artwork.starts_with(PNG_SIGNATURE) {
        "image/png"
    } else {
        "image/jpeg"
    }
}

/// Build the request for `param`. `volume_db` is restored on unmute.
fn param_request(uri: &str, param: &ControlParam, volume_db: f64) -> Request {
    match param {
        ControlParam::Volume(db) => {
            Request::set_parameter(uri, PARAMETERS_CONTENT_TYPE, volume_body(*db))
        }
        ControlParam::Muted(muted) => {
            let db = if *muted { MUTED_VOLUME_DB } else { volume_db };
            Request::set_parameter(uri, PARAMETERS_CONTENT_TYPE, volume_body(db))
        }
        ControlParam::TrackInfo {
            album,
            artist,
            title,
        } => Request::set_parameter(uri, DMAP_CONTENT_TYPE, dmap_track_info(album, artist, title)),
        ControlParam::AlbumArt(artwork) => {
            Request::set_parameter(uri, artwork_content_type(artwork), artwork.clone())
        }
    }
}

async fn control_loop(
    mut rtsp: RtspClient,
    uri: String,
    mut params: mpsc::Receiver<ControlParam>,
) {
    let mut volume_db = 0.0;

    while let Some(param) = params.recv().await {
        if let ControlParam::Volume(db) = &param {
            volume_db = *db;
        }

        let mut request = param_request(&uri, &param, volume_db);
        match rtsp.send(&mut request).await {
            Ok(response) if response.is_success() => {
                trace!(param = param.name(), "Receiver accepted parameter");
            }
            Ok(response) => {
                warn!(
                    status = response.status,
                    "Receiver rejected {}: {}",
                    param.name(),
                    response.reason
                );
            }
            Err(e) => warn!("Failed to send {}: {}", param.name(), e),
        }
    }

    if let Err(e) = rtsp.close().await {
        debug!("Error closing control connection: {}", e);
    }
}

/// A remote receiver reached over RTSP (control) and UDP (audio).
///
/// Dropping or closing the client must happen outside async code, since
/// it shuts down the client's own runtime.
pub struct RaopClient {
    name: String,
    runtime: Runtime,
    params: Mutex<Option<mpsc::Sender<ControlParam>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    data: UdpSocket,
}

impl RaopClient {
    /// Open the control connection and the data socket.
    #[instrument(name = "raop_connect", skip_all, fields(address = %config.address))]
    pub fn connect(config: &RaopClientConfig) -> PlayerResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("raop-control")
            .enable_all()
            .build()
            .map_err(|e| PlayerError::Client(format!("runtime: {}", e)))?;

        let rtsp = runtime
            .block_on(RtspClient::connect(&config.address, config.control_port))
            .map_err(|e| PlayerError::Client(e.to_string()))?;

        let data = open_data_socket(&config.address, config.data_port)
            .map_err(|e| PlayerError::Client(format!("data socket: {}", e)))?;

        let (sender, receiver) = mpsc::channel(PARAM_QUEUE_CAPACITY);
        let task = runtime.spawn(control_loop(rtsp, config.uri.clone(), receiver));

        info!(data_port = config.data_port, "Connected to AirPlay receiver");
        Ok(Self {
            name: format!("{}:{}", config.address, config.control_port),
            runtime,
            params: Mutex::new(Some(sender)),
            task: Mutex::new(Some(task)),
            data,
        })
    }

    /// Send every queued parameter, then close the control connection.
    ///
    /// Later parameters are refused. Calling this twice is harmless.
    pub fn close(&self) {
        self.params.lock().take();
        if let Some(task) = self.task.lock().take() {
            if let Err(e) = self.runtime.block_on(task) {
                warn!(name = %self.name, "Control task failed: {}", e);
            }
        }
    }
}

fn open_data_socket(address: &str, port: u16) -> io::Result<UdpSocket> {
    let bind = if address.contains(':') {
        "[::]:0"
    } else {
        "0.0.0.0:0"
    };
    let socket = UdpSocket::bind(bind)?;
    socket.connect((address, port))?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

impl ByteSink for RaopClient {
    fn write_bytes(&self, bytes: &[u8]) -> AudioResult<()> {
        match self.data.send(bytes) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                trace!(name = %self.name, "Data socket busy, dropping buffer");
                Ok(())
            }
            Err(e) => Err(AudioError::SinkWrite(e.to_string())),
        }
    }
}

impl PlayerClient for RaopClient {
    fn set_param(&self, param: &ControlParam) -> PlayerResult<()> {
        let params = self.params.lock();
        let sender = params
            .as_ref()
            .ok_or_else(|| PlayerError::Client("client closed".to_string()))?;

        sender.try_send(param.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                PlayerError::Client(format!("control queue full, dropping {}", param.name()))
            }
            mpsc::error::TrySendError::Closed(_) => {
                PlayerError::Client("control connection closed".to_string())
            }
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use bytes::Bytes;
    use audiobridge_audio::{ByteWriter, IntWriter};
    use audiobridge_transport::{read_request, Method, Response};
    use crossbeam_channel::Receiver;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_secs(2);

    /// Accept one connection, answer 200 to everything, report requests.
    fn spawn_receiver(runtime: &Runtime) -> (u16, Receiver<Request>) {
        let listener = runtime
            .block_on(TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = crossbeam_channel::unbounded();

        runtime.spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = BufReader::new(socket);
            while let Ok(Some(request)) = read_request(&mut socket).await {
                let cseq = request.header("CSeq").unwrap_or_default().to_string();
                let _ = tx.send(request);
                let response = Response::new(200, "OK").with_header("CSeq", cseq);
                if socket.write_all(&response.encode()).await.is_err() {
                    break;
                }
            }
        });

        (port, rx)
    }

    fn connect(runtime: &Runtime) -> (RaopClient, Receiver<Request>, UdpSocket) {
        let (control_port, requests) = spawn_receiver(runtime);
        let data = UdpSocket::bind("127.0.0.1:0").unwrap();
        data.set_read_timeout(Some(TIMEOUT)).unwrap();

        let config = RaopClientConfig {
            address: "127.0.0.1".to_string(),
            control_port,
            data_port: data.local_addr().unwrap().port(),
            uri: "rtsp://127.0.0.1/42".to_string(),
        };
        (RaopClient::connect(&config).unwrap(), requests, data)
    }

    fn body(request: &Request) -> String {
        String::from_utf8(request.body.to_vec()).unwrap()
    }

    #[test]
    fn test_dmap_layout() {
        let dmap = dmap_track_info("Al", "Ar", "T");
        assert_eq!(&dmap[0..4], b"mlit");
        assert_eq!(&dmap[4..8], &(dmap.len() as u32 - 8).to_be_bytes());
        assert_eq!(&dmap[8..12], b"minm");
        assert_eq!(&dmap[12..16], &1u32.to_be_bytes());
        assert_eq!(dmap[16], b'T');
        assert_eq!(&dmap[17..21], b"asar");
        assert_eq!(&dmap[25..27], b"Ar");
        assert_eq!(&dmap[27..31], b"asal");
        assert_eq!(&dmap[35..37], b"Al");
    }

    #[test]
    fn test_artwork_content_type() {
        assert_eq!(artwork_content_type(b"\x89PNG\r\n\x1a\nrest"), "image/png");
        assert_eq!(artwork_content_type(&[0xFF, 0xD8, 0xFF]), "image/jpeg");
    }

    #[test]
    fn test_volume_and_mute_requests() {
        let runtime = Runtime::new().unwrap();
        let (client, requests, _data) = connect(&runtime);

        client.set_param(&ControlParam::Volume(-15.0)).unwrap();
        client.set_param(&ControlParam::Muted(true)).unwrap();
        client.set_param(&ControlParam::Muted(false)).unwrap();

        let volume = requests.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(volume.method, Method::SetParameter);
        assert_eq!(volume.uri, "rtsp://127.0.0.1/42");
        assert_eq!(volume.header("Content-Type"), Some("text/parameters"));
        assert_eq!(volume.header("CSeq"), Some("1"));
        assert_eq!(body(&volume), "volume: -15.000000\r\n");

        let muted = requests.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(body(&muted), "volume: -144.000000\r\n");
        assert_eq!(muted.header("CSeq"), Some("2"));

        let unmuted = requests.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(body(&unmuted), "volume: -15.000000\r\n");

        client.close();
    }

    #[test]
    fn test_track_and_artwork_requests() {
        let runtime = Runtime::new().unwrap();
        let (client, requests, _data) = connect(&runtime);

        client
            .set_param(&ControlParam::TrackInfo {
                album: "Album".to_string(),
                artist: "Artist".to_string(),
                title: "Title".to_string(),
            })
            .unwrap();
        client
            .set_param(&ControlParam::AlbumArt(Bytes::from_static(
                b"\x89PNG\r\n\x1a\n....",
            )))
            .unwrap();

        let track = requests.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(
            track.header("Content-Type"),
            Some("application/x-dmap-tagged")
        );
        assert_eq!(
            &track.body[..],
            &dmap_track_info("Album", "Artist", "Title")[..]
        );

        let art = requests.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(art.header("Content-Type"), Some("image/png"));
        assert_eq!(&art.body[..], b"\x89PNG\r\n\x1a\n....");

        client.close();
    }

    #[test]
    fn test_pcm_goes_to_data_socket() {
        let runtime = Runtime::new().unwrap();
        let (client, _requests, data) = connect(&runtime);

        client.write_bytes(&[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 16];
        let n = data.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_closed_client_refuses_params() {
        let runtime = Runtime::new().unwrap();
        let (client, _requests, _data) = connect(&runtime);

        client.close();
        client.close();
        assert!(matches!(
            client.set_param(&ControlParam::Muted(true)),
            Err(PlayerError::Client(_))
        ));
    }

    #[test]
    fn test_connect_refused() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = RaopClientConfig {
            address: "127.0.0.1".to_string(),
            control_port: port,
            ..Default::default()
        };
        assert!(matches!(
            RaopClient::connect(&config),
            Err(PlayerError::Client(_))
        ));
    }

    #[test]
    fn test_player_drives_receiver() {
        let runtime = Runtime::new().unwrap();
        let (client, requests, _data) = connect(&runtime);
        let client = Arc::new(client);

        let player = Player::new(Arc::new(IntWriter::new()), Arc::new(ByteWriter::new()));
        player.add_client(Arc::clone(&client)).unwrap();
        player.set_volume(1.0);

        let request = requests.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(body(&request), "volume: 0.000000\r\n");

        client.close();
    }
}
