use futures::StreamExt;
use ragchat_stream::ChatStream;

use crate::incremental::{IncrementalRenderer, RenderUpdate};
use crate::renderer::MessageRenderer;

/// Receives the updates of one assistant turn
pub trait RenderView {
    fn show(&mut self, update: &RenderUpdate);
}

impl RenderView for Vec<RenderUpdate> {
    fn show(&mut self, update: &RenderUpdate) {
        self.push(update.clone());
    }
}

/// Feed a whole stream through `renderer` into `view`
///
/// Stops reading as soon as the message is finalized or aborted, which drops the response.
/// A stream cancelled through its [`ragchat_stream::CancelHandle`] ends with
/// [`RenderUpdate::Cancelled`] rather than an error.
pub async fn drive<R, V>(mut stream: ChatStream, renderer: &mut IncrementalRenderer<R>, view: &mut V)
where
    R: MessageRenderer,
    V: RenderView + ?Sized,
{
    while let Some(item) = stream.next().await {
        for update in renderer.apply(item) {
            view.show(&update);
        }
        if renderer.is_terminal() {
            break;
        }
    }

    let tail = if stream.was_cancelled() {
        renderer.cancel()
    } else {
        renderer.finish()
    };
    for update in tail {
        view.show(&update);
    }
}
