// Purpose: Package-management module root for the upgrade workflow.
// Inputs/Outputs: Re-exports codec/resolver/rewrite components used by the CLI.
// Invariants: Public pkg API should keep codec/resolve/rewrite boundaries explicit.
// Gotchas: ident must stay free of I/O so decode/encode remain exhaustively testable.

pub mod ident;
pub mod latest;
pub mod load;
pub mod modfile;
pub mod proxy;
pub mod rewrite;
