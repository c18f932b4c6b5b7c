use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use super::{Action, Command, Payload, Response, ResponseType};
use crate::error::ProtocolError;

#[derive(Serialize, Deserialize)]
struct WireCommand {
    action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    languages: Option<Vec<String>>,
    #[serde(rename = "saveTo", default, skip_serializing_if = "Option::is_none")]
    save_to: Option<String>,
}

#[derive(Serialize)]
struct WireResponseOut<'a> {
    #[serde(rename = "type")]
    kind: ResponseType,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Deserialize)]
struct WireResponseIn {
    #[serde(rename = "type")]
    kind: ResponseType,
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

pub fn encode_command(command: &Command) -> Result<String, ProtocolError> {
    let wire = WireCommand {
        action: command.action.as_str().to_string(),
        languages: command.languages.clone(),
        save_to: command
            .save_to
            .as_ref()
            .map(|path| path.to_string_lossy().to_string()),
    };
    let mut line = serde_json::to_string(&wire)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_command(line: &str) -> Result<Command, ProtocolError> {
    let wire: WireCommand = serde_json::from_str(line.trim())
        .map_err(|err| ProtocolError::Malformed(err.to_string()))?;
    let action =
        Action::parse(&wire.action).ok_or_else(|| ProtocolError::UnknownAction(wire.action))?;
    Ok(Command {
        action,
        languages: wire.languages,
        save_to: wire.save_to.map(PathBuf::from),
    })
}

pub fn encode_response(response: &Response) -> Result<String, ProtocolError> {
    let wire = match &response.outcome {
        Ok(payload) => WireResponseOut {
            kind: response.kind,
            success: true,
            data: Some(payload),
            error: None,
        },
        Err(message) => WireResponseOut {
            kind: response.kind,
            success: false,
            data: None,
            error: Some(message.as_str()),
        },
    };
    let mut line = serde_json::to_string(&wire)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_response(line: &str) -> Result<Response, ProtocolError> {
    let wire: WireResponseIn = serde_json::from_str(line.trim())
        .map_err(|err| ProtocolError::Malformed(err.to_string()))?;
    let kind = wire.kind;

    if !wire.success {
        let message = wire
            .error
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| "worker reported a failure without a message".to_string());
        return Ok(Response {
            kind,
            outcome: Err(message),
        });
    }

    let data = wire.data.ok_or_else(|| {
        ProtocolError::Malformed(format!("{} response is missing data", kind.as_str()))
    })?;
    let payload = match kind {
        ResponseType::Ready => Payload::Ready(parse_data(kind, data)?),
        ResponseType::Pick => Payload::Pick(parse_data(kind, data)?),
        ResponseType::Scan => Payload::Scan(parse_data(kind, data)?),
        ResponseType::Error => {
            return Err(ProtocolError::Malformed(
                "error response marked as successful".to_string(),
            ));
        }
    };
    Ok(Response {
        kind,
        outcome: Ok(payload),
    })
}

fn parse_data<T: serde::de::DeserializeOwned>(
    kind: ResponseType,
    data: Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(data)
        .map_err(|err| ProtocolError::Malformed(format!("invalid {} data: {}", kind.as_str(), err)))
}
