use super::{estimator::Estimator, matcher::Correspondence};

/// A `Iterator` wrapper for `Correspondence`.
/// This trait exposes additional functions on an `Iterator` over `Correspondence`.
pub trait CorrespondenceIterator<'a>: Iterator<Item = Correspondence<'a>> {
    /// Keeps correspondences with a Hamming distance of at most `max_distance`.
    fn within(self, max_distance: u32) -> impl Iterator<Item = Correspondence<'a>>
    where
        Self: Sized,
    {
        self.filter(move |c| c.distance() <= max_distance)
    }

    fn estimate<E, O>(self, estimator: &E) -> O
    where
        Self: Sized,
        E: Estimator<Output = O>,
    {
        estimator.estimate(self)
    }
}

impl<'a, I> CorrespondenceIterator<'a> for I where I: Iterator<Item = Correspondence<'a>> {}
