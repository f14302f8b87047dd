//! Timing of futures from their first poll until completion.

use {
    futures::future::FusedFuture,
    pin_project_lite::pin_project,
    prometheus::{HistogramTimer, HistogramVec},
    std::{
        future::Future,
        pin::Pin,
        task::{Context, Poll},
    },
};

pub trait Measure: Sized {
    /// Records the time between the first poll and completion of the future
    /// into `histogram` under the given label.
    fn measure(self, histogram: &HistogramVec, label: &str) -> Measurable<Self> {
        Measurable {
            inner: self,
            histogram: histogram.clone(),
            label: label.to_owned(),
            timer: Timer::Idle,
        }
    }
}

impl<T: Future> Measure for T {}

pin_project! {
    #[derive(Debug)]
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct Measurable<T> {
        #[pin]
        inner: T,
        histogram: HistogramVec,
        label: String,
        timer: Timer,
    }
}

#[derive(Debug)]
enum Timer {
    Idle,
    // Dropping the timer records the observation.
    Running(#[allow(dead_code)] HistogramTimer),
    Done,
}

impl<T: Future> Future for Measurable<T> {
    type Output = T::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if matches!(this.timer, Timer::Idle) {
            *this.timer = Timer::Running(
                this.histogram
                    .with_label_values(&[this.label.as_str()])
                    .start_timer(),
            );
        }
        let result = this.inner.poll(cx);
        if result.is_ready() {
            *this.timer = Timer::Done;
        }
        result
    }
}

impl<T: FusedFuture> FusedFuture for Measurable<T> {
    fn is_terminated(&self) -> bool {
        matches!(self.timer, Timer::Done)
    }
}
