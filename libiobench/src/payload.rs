use off64::usz;

/// The byte every rank writes, so that any byte of a shared object can be attributed to its writer.
pub fn sentinel_byte(rank: usize) -> u8 {
  (rank % 256) as u8
}

pub fn sentinel_payload(rank: usize, len: u64) -> Vec<u8> {
  vec![sentinel_byte(rank); usz!(len)]
}

pub fn count_sentinel(data: &[u8], rank: usize) -> u64 {
  let sentinel = sentinel_byte(rank);
  data.iter().filter(|b| **b == sentinel).count() as u64
}

#[cfg(test)]
mod tests {
  use super::count_sentinel;
  use super::sentinel_byte;
  use super::sentinel_payload;

  #[test]
  fn test_sentinel_wraps() {
    assert_eq!(sentinel_byte(0), 0);
    assert_eq!(sentinel_byte(255), 255);
    assert_eq!(sentinel_byte(256), 0);
    assert_eq!(sentinel_byte(513), 1);
  }

  #[test]
  fn test_payload_and_count() {
    let mut data = sentinel_payload(3, 10);
    assert_eq!(data.len(), 10);
    assert_eq!(count_sentinel(&data, 3), 10);
    data[4] = 0;
    assert_eq!(count_sentinel(&data, 3), 9);
    assert_eq!(count_sentinel(&data, 259), 9);
  }
}
