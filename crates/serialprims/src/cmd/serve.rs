use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serialprims_frame::{ByteView, Controller, FrameError, FrameReader, FrameWriter};
use serialprims_schema::{
    EchoMessage, ErrorResponse, MessageKind, Ping, RequestReader, ResponseWriter, SchemaConfig,
    SchemaError, SchemaRegistry, TestInfoRequest, TestInfoResponse, VerifiedRequest,
};
use serialprims_transport::{Endpoint, SerialStream, TransportError};
use tracing::{debug, info, warn};

use crate::cmd::{InvalidPolicy, ServeArgs};
use crate::exit::{schema_error, transport_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_message, OutputFormat};

const TEST_INFO_MESSAGE: &str = "response message";

/// Pause after a failed accept so a persistent failure such as EMFILE does
/// not spin.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

enum AcceptDisposition {
    Retry,
    Fatal(CliError),
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint: Endpoint = args
        .endpoint
        .parse()
        .map_err(|err| transport_error("invalid endpoint", err))?;
    let registry = Arc::new(load_registry(&args)?);

    let listener = endpoint
        .bind()
        .map_err(|err| transport_error("bind failed", err))?;
    let bound = listener.endpoint();
    info!(endpoint = %bound, on_invalid = ?args.on_invalid, "serving");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), bound)?;

    while running.load(Ordering::SeqCst) {
        let stream = match listener.accept() {
            Ok(stream) => stream,
            Err(err) => match classify_accept_error(err, args.once) {
                AcceptDisposition::Retry => {
                    thread::sleep(ACCEPT_RETRY_DELAY);
                    continue;
                }
                AcceptDisposition::Fatal(cli_err) => return Err(cli_err),
            },
        };
        if !running.load(Ordering::SeqCst) {
            break;
        }

        if args.once {
            return serve_connection(stream, &registry, args.on_invalid, format)
                .map(|_| SUCCESS)
                .map_err(|err| schema_error("connection failed", err));
        }

        let registry = Arc::clone(&registry);
        let policy = args.on_invalid;
        thread::spawn(move || {
            if let Err(err) = serve_connection(stream, &registry, policy, format) {
                warn!(error = %err, "connection ended with error");
            }
        });
    }

    Ok(SUCCESS)
}

/// A failed accept only ends the server when it was serving a single
/// connection; otherwise live connections keep running and the listener
/// tries again.
fn classify_accept_error(err: TransportError, once: bool) -> AcceptDisposition {
    if once {
        return AcceptDisposition::Fatal(transport_error("accept failed", err));
    }
    warn!(error = %err, "accept failed");
    AcceptDisposition::Retry
}

fn load_registry(args: &ServeArgs) -> CliResult<SchemaRegistry> {
    let Some(dir) = &args.schemas else {
        return Ok(SchemaRegistry::new());
    };

    let registry = SchemaRegistry::from_directory_with_config(
        dir,
        SchemaConfig {
            strict_mode: args.strict,
            ..SchemaConfig::default()
        },
    )
    .map_err(|err| CliError::new(DATA_INVALID, format!("schema load failed: {err}")))?;

    let kinds: Vec<&str> = registry.kinds().into_iter().map(MessageKind::name).collect();
    info!(dir = %dir.display(), kinds = ?kinds, "payload schemas loaded");
    Ok(registry)
}

/// Wake the blocking accept by connecting to ourselves once the flag drops.
fn install_ctrlc_handler(running: Arc<AtomicBool>, endpoint: Endpoint) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        let _ = endpoint.connect();
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

fn serve_connection(
    stream: SerialStream,
    registry: &SchemaRegistry,
    policy: InvalidPolicy,
    format: OutputFormat,
) -> serialprims_schema::Result<usize> {
    let peer = stream.peer_label();
    let transport = stream.transport_name();
    let mut writer = FrameWriter::new(stream.try_clone().map_err(FrameError::from)?);
    let mut reader = FrameReader::new(stream);
    let mut controller = Controller::new(&mut writer, &mut reader);

    info!(peer = %peer, transport, "connection accepted");
    let mut print = |request: &VerifiedRequest<'_>| {
        if let Err(err) = print_message(request, &peer, format) {
            warn!(error = %err.message, "failed printing request");
        }
    };
    let handled = serve_session(&mut controller, registry, policy, &mut print)?;
    info!(peer = %peer, handled, "connection closed");
    Ok(handled)
}

/// Answer requests until the reader reports the peer has gone.
///
/// `observe` sees every request that passed verification, before dispatch.
/// Returns the number of frames read.
fn serve_session(
    controller: &mut Controller<'_>,
    registry: &SchemaRegistry,
    policy: InvalidPolicy,
    observe: &mut dyn FnMut(&VerifiedRequest<'_>),
) -> serialprims_schema::Result<usize> {
    let requests = RequestReader::new(registry);
    let mut responders = Responders::default();
    let mut handled = 0usize;

    loop {
        let frame = match controller.recv().read() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => return Ok(handled),
            Err(err) => return Err(err.into()),
        };
        handled += 1;

        // The reply owns its data, so the frame borrow ends here.
        if let Some(reply) = handle_frame(&requests, frame, policy, observe) {
            responders.send(reply, controller)?;
        }
    }
}

/// An owned reply, decoupled from the inbound frame buffer.
#[derive(Debug, PartialEq, Eq)]
enum Reply {
    TestInfo(TestInfoResponse),
    Echo(EchoMessage),
    Ping(Ping),
    Error(ErrorResponse),
}

fn handle_frame(
    requests: &RequestReader<'_>,
    frame: ByteView<'_>,
    policy: InvalidPolicy,
    observe: &mut dyn FnMut(&VerifiedRequest<'_>),
) -> Option<Reply> {
    let outcome = requests.read(frame).and_then(|request| {
        observe(&request);
        dispatch(&request)
    });
    match outcome {
        Ok(reply) => reply,
        Err(err) => {
            warn!(error = %err, size = frame.size(), "rejected frame");
            match policy {
                InvalidPolicy::Drop => None,
                InvalidPolicy::Reply => Some(Reply::Error(ErrorResponse {
                    message: err.to_string(),
                })),
            }
        }
    }
}

/// Inbound `error` envelopes are never answered, whatever their payload.
fn dispatch(request: &VerifiedRequest<'_>) -> Result<Option<Reply>, SchemaError> {
    let reply = match request.kind() {
        MessageKind::TestInfo => {
            let TestInfoRequest { id } = request.payload()?;
            Reply::TestInfo(TestInfoResponse {
                id,
                message: TEST_INFO_MESSAGE.to_string(),
                success: true,
            })
        }
        MessageKind::Echo => Reply::Echo(request.payload()?),
        MessageKind::Ping => Reply::Ping(request.payload()?),
        MessageKind::Error => {
            match request.payload::<ErrorResponse>() {
                Ok(ErrorResponse { message }) => warn!(message = %message, "peer reported an error"),
                Err(_) => warn!(payload = request.raw_payload(), "peer reported an error"),
            }
            return Ok(None);
        }
    };
    debug!(kind = %request.kind(), "dispatched request");
    Ok(Some(reply))
}

/// One reusable writer per response kind, so builders keep their capacity
/// across the session.
#[derive(Default)]
struct Responders {
    test_info: ResponseWriter<TestInfoResponse>,
    echo: ResponseWriter<EchoMessage>,
    ping: ResponseWriter<Ping>,
    error: ResponseWriter<ErrorResponse>,
}

impl Responders {
    fn send(
        &mut self,
        reply: Reply,
        controller: &mut Controller<'_>,
    ) -> serialprims_schema::Result<()> {
        match reply {
            Reply::TestInfo(data) => {
                self.test_info.set_data(data);
                controller.send(&mut self.test_info)
            }
            Reply::Echo(data) => {
                self.echo.set_data(data);
                controller.send(&mut self.echo)
            }
            Reply::Ping(data) => {
                self.ping.set_data(data);
                controller.send(&mut self.ping)
            }
            Reply::Error(data) => {
                self.error.set_data(data);
                controller.send(&mut self.error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use serialprims_frame::{loopback, LoopbackReader, Reader, Writer};
    use serialprims_schema::MessageBuilder;

    use super::*;

    fn ignore(_: &VerifiedRequest<'_>) {}

    fn run_session(requests: &[&[u8]], policy: InvalidPolicy) -> (usize, LoopbackReader) {
        let (handled, replies, _) = run_observed_session(requests, policy);
        (handled, replies)
    }

    /// Also returns the kinds of the requests that reached the observer.
    fn run_observed_session(
        requests: &[&[u8]],
        policy: InvalidPolicy,
    ) -> (usize, LoopbackReader, Vec<MessageKind>) {
        let (mut client_tx, mut server_rx) = loopback();
        let (mut server_tx, client_rx) = loopback();
        for request in requests {
            client_tx.write(ByteView::new(request)).unwrap();
        }
        drop(client_tx);

        let registry = SchemaRegistry::new();
        let mut seen = Vec::new();
        let mut controller = Controller::new(&mut server_tx, &mut server_rx);
        let handled = serve_session(&mut controller, &registry, policy, &mut |request: &VerifiedRequest<'_>| {
            seen.push(request.kind())
        })
        .unwrap();
        (handled, client_rx, seen)
    }

    fn next_reply<T: serde::de::DeserializeOwned>(
        reader: &mut LoopbackReader,
    ) -> (MessageKind, T) {
        let registry = SchemaRegistry::new();
        let frame = reader.read().unwrap();
        let request = RequestReader::new(&registry).read(frame).unwrap();
        (request.kind(), request.payload().unwrap())
    }

    #[test]
    fn answers_each_builtin_kind() {
        let mut builder = MessageBuilder::new();
        let test_info = builder
            .encode(MessageKind::TestInfo, &TestInfoRequest { id: 12 })
            .unwrap()
            .to_bytes();
        let echo = builder
            .encode(MessageKind::Echo, &EchoMessage { text: "hello".into() })
            .unwrap()
            .to_bytes();
        let ping = builder
            .encode(MessageKind::Ping, &Ping { seq: 99 })
            .unwrap()
            .to_bytes();

        let (handled, mut replies) =
            run_session(&[&test_info[..], &echo[..], &ping[..]], InvalidPolicy::Drop);
        assert_eq!(handled, 3);

        let (kind, info): (_, TestInfoResponse) = next_reply(&mut replies);
        assert_eq!(kind, MessageKind::TestInfo);
        assert_eq!(
            info,
            TestInfoResponse {
                id: 12,
                message: TEST_INFO_MESSAGE.into(),
                success: true,
            }
        );

        let (kind, echoed): (_, EchoMessage) = next_reply(&mut replies);
        assert_eq!(kind, MessageKind::Echo);
        assert_eq!(echoed.text, "hello");

        let (kind, pong): (_, Ping) = next_reply(&mut replies);
        assert_eq!(kind, MessageKind::Ping);
        assert_eq!(pong.seq, 99);
    }

    #[test]
    fn invalid_frames_are_dropped_by_default() {
        let (handled, mut replies) = run_session(
            &[&b"garbage"[..], &br#"{"type":3,"data":{"seq":1}}"#[..]],
            InvalidPolicy::Drop,
        );
        assert_eq!(handled, 2);

        let (kind, pong): (_, Ping) = next_reply(&mut replies);
        assert_eq!(kind, MessageKind::Ping);
        assert_eq!(pong.seq, 1);
        assert!(matches!(replies.read(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn invalid_frames_get_error_reply_when_asked() {
        let (_, mut replies) = run_session(&[&b"garbage"[..]], InvalidPolicy::Reply);

        let (kind, error): (_, ErrorResponse) = next_reply(&mut replies);
        assert_eq!(kind, MessageKind::Error);
        assert!(error.message.starts_with("malformed envelope"));
    }

    #[test]
    fn payload_of_wrong_shape_is_invalid() {
        let (_, mut replies) = run_session(
            &[&br#"{"type":1,"data":{"id":"twelve"}}"#[..]],
            InvalidPolicy::Reply,
        );

        let (kind, error): (_, ErrorResponse) = next_reply(&mut replies);
        assert_eq!(kind, MessageKind::Error);
        assert!(error.message.starts_with("failed to decode payload"));
    }

    #[test]
    fn inbound_error_envelopes_get_no_reply() {
        let registry = SchemaRegistry::new();
        let requests = RequestReader::new(&registry);
        let frame = ByteView::from(br#"{"type":4,"data":{"message":"boom"}}"#);
        assert_eq!(
            handle_frame(&requests, frame, InvalidPolicy::Reply, &mut ignore),
            None
        );
    }

    #[test]
    fn error_envelope_with_unexpected_payload_gets_no_reply() {
        let registry = SchemaRegistry::new();
        let requests = RequestReader::new(&registry);
        let frames = [
            &br#"{"type":4,"data":{}}"#[..],
            &br#"{"type":4,"data":{"message":7}}"#[..],
        ];
        for bytes in frames {
            let frame = ByteView::new(bytes);
            assert_eq!(
                handle_frame(&requests, frame, InvalidPolicy::Reply, &mut ignore),
                None
            );
        }
    }

    #[test]
    fn verified_requests_reach_the_observer() {
        let (handled, mut replies, seen) = run_observed_session(
            &[
                &br#"{"type":2,"data":{"text":"x"}}"#[..],
                &b"garbage"[..],
                &br#"{"type":1,"data":{"id":"bad"}}"#[..],
                &br#"{"type":4,"data":{}}"#[..],
            ],
            InvalidPolicy::Drop,
        );
        assert_eq!(handled, 4);
        assert_eq!(
            seen,
            vec![MessageKind::Echo, MessageKind::TestInfo, MessageKind::Error]
        );

        let (kind, _): (_, EchoMessage) = next_reply(&mut replies);
        assert_eq!(kind, MessageKind::Echo);
        assert!(matches!(replies.read(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn accept_failure_keeps_serving() {
        let err = TransportError::Accept(io::Error::from(io::ErrorKind::ConnectionAborted));
        assert!(matches!(
            classify_accept_error(err, false),
            AcceptDisposition::Retry
        ));
    }

    #[test]
    fn accept_failure_is_fatal_for_single_connection() {
        let err = TransportError::Accept(io::Error::from(io::ErrorKind::ConnectionAborted));
        match classify_accept_error(err, true) {
            AcceptDisposition::Fatal(cli_err) => {
                assert_ne!(cli_err.code, SUCCESS);
                assert!(cli_err.message.starts_with("accept failed"));
            }
            AcceptDisposition::Retry => panic!("expected fatal disposition"),
        }
    }

    #[test]
    fn empty_frame_is_rejected() {
        let registry = SchemaRegistry::new();
        let requests = RequestReader::new(&registry);
        assert_eq!(
            handle_frame(&requests, ByteView::EMPTY, InvalidPolicy::Drop, &mut ignore),
            None
        );
        assert_eq!(
            handle_frame(&requests, ByteView::EMPTY, InvalidPolicy::Reply, &mut ignore),
            Some(Reply::Error(ErrorResponse {
                message: "empty message".into()
            }))
        );
    }
}
