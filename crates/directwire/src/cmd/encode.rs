use std::fmt::Display;
use std::fs;
use std::str::FromStr;

use directwire_frame::{
    keys, Envelope, EnvelopeWriter, HeaderCollection, HeaderValue, ResponseHeader, ValueType,
};
use uuid::Uuid;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::print_raw;

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let mut headers = HeaderCollection::new();
    headers.set::<keys::TransportRequestId>(args.request_id);
    for arg in &args.headers {
        let (header, value) = parse_header_arg(arg)?;
        headers.insert(header.id(), value);
    }

    let payload = resolve_payload(&args)?;
    let correlation_id = args.correlation_id.unwrap_or_else(Uuid::new_v4);
    let envelope = Envelope::new(correlation_id, args.status, headers, payload)
        .map_err(|err| frame_error("invalid frame", err))?;

    let mut writer = EnvelopeWriter::new(Vec::with_capacity(envelope.message_length()));
    writer
        .write_envelope(&envelope)
        .map_err(|err| frame_error("encode failed", err))?;
    let wire = writer.into_inner();
    tracing::debug!(
        correlation_id = %correlation_id,
        status = args.status,
        bytes = wire.len(),
        "encoded frame"
    );

    let out = if args.hex {
        format!("{}\n", hex::encode(&wire)).into_bytes()
    } else {
        wire
    };
    match &args.output {
        Some(path) => fs::write(path, &out)
            .map_err(|err| io_error(&format!("failed writing {}", path.display()), err))?,
        None => print_raw(&out),
    }

    Ok(SUCCESS)
}

fn resolve_payload(args: &EncodeArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(json.as_bytes().to_vec());
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

/// Parse a `NAME=VALUE` header argument against the registry.
fn parse_header_arg(arg: &str) -> CliResult<(ResponseHeader, HeaderValue)> {
    let (name, text) = arg
        .split_once('=')
        .ok_or_else(|| CliError::new(USAGE, format!("header must be NAME=VALUE, got {arg:?}")))?;
    let header = ResponseHeader::from_name(name.trim()).ok_or_else(|| {
        CliError::new(
            USAGE,
            format!("unknown header {name:?} (see `directwire headers`)"),
        )
    })?;
    let value = parse_value(header, text)?;
    Ok((header, value))
}

fn parse_value(header: ResponseHeader, text: &str) -> CliResult<HeaderValue> {
    let value = match header.value_type() {
        ValueType::Byte => match text {
            "true" => HeaderValue::Byte(1),
            "false" => HeaderValue::Byte(0),
            _ => HeaderValue::Byte(number(header, text)?),
        },
        ValueType::UShort => HeaderValue::UShort(number(header, text)?),
        ValueType::ULong => HeaderValue::ULong(number(header, text)?),
        ValueType::Long => HeaderValue::Long(number(header, text)?),
        ValueType::ULongLong => HeaderValue::ULongLong(number(header, text)?),
        ValueType::LongLong => HeaderValue::LongLong(number(header, text)?),
        ValueType::Float => HeaderValue::Float(number(header, text)?),
        ValueType::Double => HeaderValue::Double(number(header, text)?),
        ValueType::Guid => HeaderValue::Guid(number(header, text)?),
        ValueType::SmallString => HeaderValue::SmallString(text.to_string()),
        ValueType::String => HeaderValue::String(text.to_string()),
        ValueType::ULongString => HeaderValue::ULongString(text.to_string()),
        ValueType::SmallBytes => HeaderValue::SmallBytes(hex_value(header, text)?.into()),
        ValueType::Bytes => HeaderValue::Bytes(hex_value(header, text)?.into()),
        ValueType::ULongBytes => HeaderValue::ULongBytes(hex_value(header, text)?.into()),
    };
    Ok(value)
}

fn number<T>(header: ResponseHeader, text: &str) -> CliResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    text.trim()
        .parse()
        .map_err(|err| invalid_value(header, text, err))
}

fn hex_value(header: ResponseHeader, text: &str) -> CliResult<Vec<u8>> {
    hex::decode(text.trim()).map_err(|err| invalid_value(header, text, err))
}

fn invalid_value(header: ResponseHeader, text: &str, err: impl Display) -> CliError {
    CliError::new(
        USAGE,
        format!(
            "invalid {:?} value {text:?} for {}: {err}",
            header.value_type(),
            header.name()
        ),
    )
}
