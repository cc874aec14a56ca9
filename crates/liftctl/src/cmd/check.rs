use liftctl_macro::{validate, MacroFile, ValidationOptions};

use crate::cmd::CheckArgs;
use crate::exit::{macro_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_job, print_violations, OutputFormat};

pub fn run(args: CheckArgs, format: OutputFormat) -> CliResult<i32> {
    let file = MacroFile::load(&args.macro_file).map_err(|err| {
        macro_error(&format!("failed reading {}", args.macro_file.display()), err)
    })?;
    let options = ValidationOptions {
        enforce_access_mode: args.mode.map(Into::into),
        default_channel: args.default_channel,
    };

    let job = match validate(&file, &options) {
        Ok(job) => job,
        Err(errors) => {
            print_violations(&errors, format);
            return Err(CliError::new(
                DATA_INVALID,
                format!("macro rejected: {errors}"),
            ));
        }
    };

    if let Some(output) = &args.output {
        file.save(output).map_err(|err| {
            macro_error(&format!("failed writing {}", output.display()), err)
        })?;
    }
    print_job(&job, format);
    Ok(SUCCESS)
}
