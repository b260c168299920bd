// ============================================================
// Layer 4 — MAMI Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<MamiSample>
// into tensors for one forward pass.
//
//   Input:  N samples, each with input_ids / attention_mask of
//           length S (already padded by the dataset)
//   Output: MamiBatch with [N, S] id and mask tensors
//
// Image paths and ground-truth labels stay on the host: the
// paths key the prediction map, and the labels are turned into
// a target tensor by the label accumulator, which is also where
// missing labels are reported.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::MamiSample;
use crate::domain::record::LabelSet;

#[derive(Debug, Clone)]
pub struct MamiBatch<B: Backend> {
    /// Token ID sequences — shape: [batch_size, seq_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding — shape: [batch_size, seq_len]
    pub attention_mask: Tensor<B, 2, Int>,

    /// Image path of every sample, in batch order
    pub images: Vec<String>,

    /// Record key of every sample, in batch order
    pub keys: Vec<String>,

    /// Ground-truth labels, in batch order
    pub outputs: Vec<LabelSet>,
}

impl<B: Backend> MamiBatch<B> {
    pub fn len(&self) -> usize {
        self.images.len()
    }
}

#[derive(Clone, Debug)]
pub struct MamiBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> MamiBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<MamiSample, MamiBatch<B>> for MamiBatcher<B> {
    fn batch(&self, items: Vec<MamiSample>) -> MamiBatch<B> {
        let batch_size = items.len();
        let seq_len    = items.first().map(|s| s.input.input_ids.len()).unwrap_or(0);

        let input_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.input.input_ids.iter().map(|&x| x as i32))
            .collect();

        let mask_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.input.attention_mask.iter().map(|&x| x as i32))
            .collect();

        let input_ids = Tensor::<B, 1, Int>::from_ints(
            input_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        let attention_mask = Tensor::<B, 1, Int>::from_ints(
            mask_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        let mut images  = Vec::with_capacity(batch_size);
        let mut keys    = Vec::with_capacity(batch_size);
        let mut outputs = Vec::with_capacity(batch_size);
        for item in items {
            images.push(item.input.image);
            keys.push(item.key);
            outputs.push(item.output);
        }

        MamiBatch { input_ids, attention_mask, images, keys, outputs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::SampleInput;
    use crate::domain::label::LabelField;
    use burn::backend::NdArray;

    fn sample(name: &str, ids: Vec<u32>, mask: Vec<u32>, misogynous: bool) -> MamiSample {
        let mut output = LabelSet::default();
        output.set(LabelField::Misogynous, misogynous);
        MamiSample {
            input: SampleInput {
                image: format!("img/{name}"),
                text: "t".to_string(),
                input_ids: ids,
                attention_mask: mask,
            },
            output,
            key: name.to_string(),
        }
    }

    #[test]
    fn test_batch_shapes_and_order() {
        let batcher = MamiBatcher::<NdArray>::new(Default::default());
        let batch = batcher.batch(vec![
            sample("a.jpg", vec![2, 7, 3, 0], vec![1, 1, 1, 0], true),
            sample("b.jpg", vec![2, 9, 9, 3], vec![1, 1, 1, 1], false),
        ]);

        assert_eq!(batch.input_ids.dims(), [2, 4]);
        assert_eq!(batch.attention_mask.dims(), [2, 4]);
        assert_eq!(batch.images, ["img/a.jpg", "img/b.jpg"]);
        assert_eq!(batch.keys, ["a.jpg", "b.jpg"]);
        assert_eq!(batch.outputs[0].get(LabelField::Misogynous), Some(true));
        assert_eq!(batch.len(), 2);

        let mask_sum: i64 = batch.attention_mask.sum().into_scalar().elem::<i64>();
        assert_eq!(mask_sum, 7);
    }
}
