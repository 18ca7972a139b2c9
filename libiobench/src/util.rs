use iobench_universal_client::MIB;

pub(crate) fn div_ceil(n: u64, d: u64) -> u64 {
  (n / d) + ((n % d != 0) as u64)
}

pub fn bytes_to_mib(bytes: u64) -> f64 {
  bytes as f64 / MIB as f64
}

#[cfg(test)]
mod tests {
  use crate::util::bytes_to_mib;
  use crate::util::div_ceil;

  #[test]
  fn test_div_ceil() {
    assert_eq!(div_ceil(0, 1), 0);
    assert_eq!(div_ceil(0, 2), 0);
    assert_eq!(div_ceil(1, 2), 1);
    assert_eq!(div_ceil(10, 3), 4);
    assert_eq!(div_ceil(250, 100), 3);
    assert_eq!(div_ceil(300, 100), 3);
  }

  #[test]
  fn test_bytes_to_mib() {
    assert_eq!(bytes_to_mib(0), 0.0);
    assert_eq!(bytes_to_mib(3 * 1024 * 1024), 3.0);
    assert_eq!(bytes_to_mib(512 * 1024), 0.5);
  }
}
