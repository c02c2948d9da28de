/// Scales `vec` to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(vec: &mut [f32]) {
	let norm = vec.iter().map(|value| value * value).sum::<f32>().sqrt();

	if norm == 0.0 || !norm.is_finite() {
		return;
	}

	for value in vec.iter_mut() {
		*value /= norm;
	}
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() || a.is_empty() {
		return 0.0;
	}

	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

	if norm_a == 0.0 || norm_b == 0.0 {
		return 0.0;
	}

	dot / (norm_a * norm_b)
}
