use forca_bridge::Completion;

/// All possible messages that drive state transitions.
#[derive(Debug)]
pub enum Msg {
    // -- Input events
    Line(String),
    InputClosed,

    // -- Host
    Completion(Completion),
}
