use std::process::ExitCode;

fn main() -> ExitCode {
    ao3_filter_lib::run()
}
