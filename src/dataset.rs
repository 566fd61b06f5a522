use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;

/// Dataset split an item lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Items divided into training, validation and testing sets
#[derive(Debug, Clone, PartialEq)]
pub struct SplitData<T> {
    pub train: Vec<T>,
    pub val: Vec<T>,
    pub test: Vec<T>,
}

impl<T> SplitData<T> {
    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The splits in train, val, test order.
    pub fn into_parts(self) -> [(Split, Vec<T>); 3] {
        [
            (Split::Train, self.train),
            (Split::Val, self.val),
            (Split::Test, self.test),
        ]
    }
}

/// Split the items into training, validation, and testing sets.
///
/// The items are shuffled with a seeded generator, so the same input order
/// and seed always give the same split. Sizes are rounded up; the test set
/// is taken first, then the validation set, and the rest is training.
pub fn split_annotations<T>(
    mut items: Vec<T>,
    val_size: f32,
    test_size: f32,
    seed: u64,
) -> SplitData<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);

    let total = items.len();
    let test_len = ((total as f32 * test_size).ceil() as usize).min(total);
    let val_len = ((total as f32 * val_size).ceil() as usize).min(total - test_len);

    let test: Vec<T> = items.drain(..test_len).collect();
    let val: Vec<T> = items.drain(..val_len).collect();

    SplitData {
        train: items,
        val,
        test,
    }
}
