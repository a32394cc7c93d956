//! Signal Processing Module
//!
//! Digital signal processing primitives for EEG/EOG/EMG and respiration data:
//! - Butterworth lowpass/highpass/bandpass filters with zero-phase application
//! - Welch power spectral density
//! - Sampling-rate conversion
//! - Peak finding
//!
//! All filters use second-order sections (biquads) for numerical stability.

mod filters;
mod peaks;
mod resample;
mod spectral;

pub use filters::{
    bandpass_filtfilt, create_filter, BiquadCoeffs, BiquadFilter, ButterworthFilter,
    FilterConfig, FilterType, SosFilter,
};
pub use peaks::{find_peaks, local_maxima, peak_prominence, PeakOptions, Peaks};
pub use resample::{fft_resample, resample, resampled_len};
pub use spectral::{welch, Psd};
