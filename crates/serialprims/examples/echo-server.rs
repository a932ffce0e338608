//! Minimal echo server: accepts one peer and answers echo and ping requests.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send unix:/tmp/serialprims-echo-<pid>/echo.sock \
//!     --kind echo --json '{"text":"hello"}'

use std::fs;

use serialprims::frame::{Controller, FrameError, FrameReader, FrameWriter};
use serialprims::schema::{
    EchoMessage, MessageKind, Ping, RequestReader, ResponseWriter, SchemaRegistry,
};
use serialprims::transport::UnixDomainSocket;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("serialprims-echo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("echo.sock");

    let listener = UnixDomainSocket::bind(&sock_path)?;
    eprintln!("Listening on {}", sock_path.display());

    let stream = listener.accept()?;
    eprintln!("Peer connected: {}", stream.peer_label());

    let mut writer = FrameWriter::new(stream.try_clone()?);
    let mut reader = FrameReader::new(stream);
    let mut controller = Controller::new(&mut writer, &mut reader);

    let registry = SchemaRegistry::new();
    let requests = RequestReader::new(&registry);
    let mut echo = ResponseWriter::<EchoMessage>::default();
    let mut pong = ResponseWriter::<Ping>::default();

    loop {
        let frame = match controller.recv().read() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => break,
            Err(e) => {
                eprintln!("Peer disconnected: {e}");
                break;
            }
        };

        let request = match requests.read(frame) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("Dropped {} byte frame: {e}", frame.size());
                continue;
            }
        };
        eprintln!("Received {} ({} bytes)", request.kind(), frame.size());

        match request.kind() {
            MessageKind::Echo => {
                echo.set_data(request.payload()?);
                controller.send(&mut echo)?;
            }
            MessageKind::Ping => {
                pong.set_data(request.payload()?);
                controller.send(&mut pong)?;
            }
            _ => {}
        }
    }

    drop(listener);
    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
