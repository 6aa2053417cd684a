/// Message inspector.
///
/// Decodes a binary payload against a JSON schema and prints its text
/// form, encoded size, initialization status and SHA-256 fingerprint.
///
/// Usage: msg_runtime <schema.json> <full.message.Name> <payload.bin> [--delimited]

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use msg_runtime::decode::{decode, decode_length_delimited};
use msg_runtime::msg_schema::DescriptorPool;
use msg_runtime::{DecodeOptions, Error, MessageExt};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let delimited = args.iter().any(|a| a == "--delimited");
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

    if positional.len() != 3 {
        eprintln!("usage: msg_runtime <schema.json> <full.message.Name> <payload.bin> [--delimited]");
        return ExitCode::FAILURE;
    }

    match run(
        Path::new(positional[0]),
        positional[1],
        Path::new(positional[2]),
        delimited,
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(schema: &Path, message_name: &str, payload: &Path, delimited: bool) -> Result<(), Error> {
    let pool = DescriptorPool::from_file(schema)?;
    let descriptor = pool
        .get(message_name)
        .ok_or_else(|| Error::Malformed(format!("schema has no message {:?}", message_name)))?;

    let bytes = fs::read(payload)?;
    let options = DecodeOptions::default();

    let mut frames = Vec::new();
    if delimited {
        let mut buf = bytes.as_slice();
        while !buf.is_empty() {
            frames.push(decode_length_delimited(descriptor, &mut buf, &options)?);
        }
    } else {
        frames.push(decode(descriptor, &bytes, &options)?);
    }

    for (i, message) in frames.iter().enumerate() {
        if delimited {
            println!("# frame {}", i);
        }
        print!("{}", message);
        println!("# serialized_size: {}", message.serialized_size());
        let missing = message.initialization_errors();
        if missing.is_empty() {
            println!("# initialized: true");
        } else {
            println!("# initialized: false (missing {})", missing.join(", "));
        }
        println!("# sha256: {}", message.fingerprint());
    }
    Ok(())
}
