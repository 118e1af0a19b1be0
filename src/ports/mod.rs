/// Ports module defining interfaces for hexagonal architecture
///
/// Outbound (driven) ports describe everything the run needs from the outside:
/// where controls come from, how the target is reached, and where results go.
pub mod outbound;
