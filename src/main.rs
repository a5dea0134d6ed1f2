// Purpose: Provide the binary entry for the gsmajor CLI.
// Inputs/Outputs: Reads process args and returns process exit code from CLI dispatcher.
// Invariants: Main must not bypass centralized CLI argument/diagnostic handling.
// Gotchas: All user-facing printing lives in the cli module, not here.

fn main() {
    let code = gsmajor::cli::run_cli(std::env::args().skip(1));
    std::process::exit(code);
}
