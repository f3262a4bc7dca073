use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use directwire_frame::{BufferPool, ContextMetadata, CountingPool, EnvelopeReader, FrameConfig};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, translate_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_envelope, print_record, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let pool = Arc::new(CountingPool::new());
    let config = FrameConfig {
        max_frame_length: args.max_frame_length,
        max_payload_size: args.max_payload,
        pool: Some(pool.clone() as Arc<dyn BufferPool>),
    };
    let context = ContextMetadata {
        server_agent: args.server_agent.clone(),
        server_version: args.server_version.clone(),
        idle_timeout_secs: None,
    };

    let reader = EnvelopeReader::with_config(open_input(&args)?, config);
    let mut frames = 0usize;
    for envelope in reader {
        let envelope = envelope.map_err(|err| frame_error(&format!("frame {frames}"), err))?;
        if args.envelope {
            print_envelope(&envelope, format);
        } else {
            let record = envelope
                .to_result(&context)
                .map_err(|err| translate_error(&format!("frame {frames}"), err))?;
            print_record(&record, format);
        }
        envelope.release();
        frames += 1;
    }

    tracing::debug!(
        frames,
        reclaimed = pool.reclaims(),
        bytes = pool.reclaimed_bytes(),
        "decode finished"
    );
    Ok(SUCCESS)
}

fn open_input(args: &DecodeArgs) -> CliResult<Box<dyn Read>> {
    if let Some(text) = &args.hex {
        let bytes = hex::decode(text.trim())
            .map_err(|err| CliError::new(USAGE, format!("--hex is not valid hex: {err}")))?;
        return Ok(Box::new(Cursor::new(bytes)));
    }

    match args.input.as_deref() {
        Some(path) if path != Path::new("-") => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(std::io::stdin().lock())),
    }
}
