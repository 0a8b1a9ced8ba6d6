use tokio::sync::mpsc::UnboundedSender;

/// One phase report from the ingestion pipeline.
///
/// `fraction` is in [0, 1] and non-decreasing over a single `process` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub fraction: f32,
    pub label: String,
}

/// Fire-and-forget progress channel.
///
/// The pipeline posts updates; the consumer side owns rendering. A dropped
/// or absent receiver never affects ingestion.
#[derive(Clone, Default)]
pub struct ProgressSink {
    sender: Option<UnboundedSender<ProgressUpdate>>,
}

impl ProgressSink {
    pub fn new(sender: UnboundedSender<ProgressUpdate>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn report(&self, fraction: f32, label: impl Into<String>) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(ProgressUpdate {
                fraction,
                label: label.into(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_flow_through_the_channel() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let sink = ProgressSink::new(sender);

        sink.report(0.1, "Uploading raw file...");
        sink.report(1.0, "Done!");

        assert_eq!(
            receiver.try_recv().expect("first update"),
            ProgressUpdate {
                fraction: 0.1,
                label: "Uploading raw file...".to_owned()
            }
        );
        assert_eq!(receiver.try_recv().expect("second update").fraction, 1.0);
    }

    #[tokio::test]
    async fn disabled_sink_is_a_no_op() {
        let sink = ProgressSink::disabled();
        sink.report(0.5, "nobody listening");
    }

    #[tokio::test]
    async fn dropped_receiver_is_tolerated() {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        let sink = ProgressSink::new(sender);
        drop(receiver);

        sink.report(0.5, "receiver gone");
    }
}
