use std::time::Duration;

use serde_json::Value;
use serialprims_frame::{ByteView, Controller, FrameConfig, FrameError, FrameReader, FrameWriter};
use serialprims_schema::{MessageBuilder, MessageKind, RequestReader, SchemaRegistry};
use serialprims_transport::Endpoint;
use tracing::debug;

use crate::cmd::SendArgs;
use crate::exit::{
    frame_error, schema_error, transport_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE,
};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint: Endpoint = args
        .endpoint
        .parse()
        .map_err(|err| transport_error("invalid endpoint", err))?;
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(args.json.as_deref())?;

    let mut builder = MessageBuilder::new();
    let request = builder
        .encode(args.kind, &payload)
        .map_err(|err| schema_error("encode failed", err))?;

    let stream = endpoint
        .connect()
        .map_err(|err| transport_error("connect failed", err))?;
    let peer = endpoint.to_string();
    let config = FrameConfig {
        read_timeout: Some(timeout),
        write_timeout: Some(timeout),
        ..FrameConfig::default()
    };
    let write_half = stream
        .try_clone()
        .map_err(|err| transport_error("connect failed", err))?;
    let mut writer = FrameWriter::with_config_stream(write_half, config.clone())
        .map_err(|err| frame_error("connect failed", err))?;
    let mut reader = FrameReader::with_config_stream(stream, config)
        .map_err(|err| frame_error("connect failed", err))?;
    let mut controller = Controller::new(&mut writer, &mut reader);

    let response = exchange(&mut controller, request)
        .map_err(|err| frame_error("exchange failed", err))?;

    let registry = SchemaRegistry::new();
    let verified = RequestReader::new(&registry)
        .read(response)
        .map_err(|err| schema_error("response rejected", err))?;
    print_message(&verified, &peer, format)?;

    if verified.kind() == MessageKind::Error {
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}

/// Send one request frame and block for the next inbound frame.
fn exchange<'c>(
    controller: &'c mut Controller<'_>,
    mut request: ByteView<'_>,
) -> Result<ByteView<'c>, FrameError> {
    controller.send(&mut request)?;
    debug!(size = request.size(), "request sent, awaiting response");
    controller.recv().read()
}

/// The request payload object. Absent input encodes as `{}`.
fn resolve_payload(json: Option<&str>) -> CliResult<Value> {
    let Some(json) = json else {
        return Ok(Value::Object(Default::default()));
    };

    let value: Value = serde_json::from_str(json)
        .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
    if !value.is_object() {
        return Err(CliError::new(USAGE, "--json must be a JSON object"));
    }
    Ok(value)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
