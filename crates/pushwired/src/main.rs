use std::process::ExitCode;

fn main() -> ExitCode {
    match pushwired::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("pushwired: {error}");
            ExitCode::FAILURE
        }
    }
}
