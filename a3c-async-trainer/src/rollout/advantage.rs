/// Discounted cumulative sum, `y[t] = x[t] + gamma * y[t + 1]`.
///
/// Equivalent to filtering the reversed sequence with the IIR filter
/// `1 / (1 - gamma z^-1)` and reversing the result.
pub fn discount(x: &[f32], gamma: f32) -> Vec<f32> {
    let mut y = vec![0f32; x.len()];
    let mut acc = 0f32;
    for t in (0..x.len()).rev() {
        acc = x[t] + gamma * acc;
        y[t] = acc;
    }
    y
}

/// Computes `(returns, advantages)` of a rollout.
///
/// * `rewards` - rewards `r_t` of the rollout
/// * `values` - value estimates `V(s_t)` recorded while acting
/// * `bootstrap` - value of the state following the last transition,
///   `0` if the episode terminated there
/// * `gamma` - discount factor
///
/// Returns are the discounted sums of the rewards extended with `bootstrap`.
/// Advantages are the one-step temporal difference residuals
/// `r_t + gamma * V(s_t+1) - V(s_t)`, with `bootstrap` standing in for
/// `V(s_T+1)`. This is GAE with `lambda = 0`, not a multi-step estimate.
pub fn compute_targets(
    rewards: &[f32],
    values: &[f32],
    bootstrap: f32,
    gamma: f32,
) -> (Vec<f32>, Vec<f32>) {
    let n = rewards.len();
    assert_eq!(values.len(), n);

    let rewards_plus = rewards
        .iter()
        .copied()
        .chain(std::iter::once(bootstrap))
        .collect::<Vec<_>>();
    let mut returns = discount(&rewards_plus, gamma);
    returns.truncate(n);

    let values_plus = values
        .iter()
        .copied()
        .chain(std::iter::once(bootstrap))
        .collect::<Vec<_>>();
    let advantages = (0..n)
        .map(|t| rewards[t] + gamma * values_plus[t + 1] - values_plus[t])
        .collect();

    (returns, advantages)
}
