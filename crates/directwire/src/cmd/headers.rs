use crate::cmd::HeadersArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_registry, OutputFormat};

pub fn run(_args: HeadersArgs, format: OutputFormat) -> CliResult<i32> {
    print_registry(format);
    Ok(SUCCESS)
}
