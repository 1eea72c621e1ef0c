//! In-place cyclic permutation (Knuth, TAOCP vol. 3).

/// Apply the gather permutation `data_new[j] = data_old[perm[j]]` in place:
/// O(N) time, one element of scratch.
///
/// `perm` maps new position to old position (`perm[new] = old`) and is
/// consumed: it reads as the identity afterwards.
pub fn permute_in_place<T: Copy>(data: &mut [T], perm: &mut [usize]) {
    debug_assert_eq!(data.len(), perm.len());
    for i in 0..data.len() {
        if i != perm[i] {
            let temp = data[i];
            let mut j = i;
            while i != perm[j] {
                let k = perm[j];
                data[j] = data[k];
                perm[j] = j;
                j = k;
            }
            data[j] = temp;
            perm[j] = j;
        }
    }
}
