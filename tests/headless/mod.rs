//! Tests for the headless command-line surface

#[cfg(feature = "headless")]
mod headless_tests {
    use image::{DynamicImage, GrayImage, Luma};
    use studycam::config::StudyCamConfig;
    use studycam::errors::DeviceError;
    use studycam::platform::list_devices;
    use studycam::quality::evaluate_image;

    #[test]
    fn test_list_devices_reports_enumeration_errors() {
        // Machines without a camera backend report an enumeration failure
        match list_devices() {
            Ok(devices) => {
                for device in devices {
                    assert!(!device.index.is_empty());
                }
            }
            Err(DeviceError::EnumerationFailed(reason)) => assert!(!reason.is_empty()),
            Err(other) => panic!("unexpected error kind: {:?}", other),
        }
    }

    #[test]
    fn test_check_image_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");

        let page = GrayImage::from_fn(64, 64, |x, y| {
            if ((x / 8) + (y / 8)) % 2 == 0 {
                Luma([20u8])
            } else {
                Luma([220u8])
            }
        });
        page.save(&path).unwrap();

        let loaded = image::open(&path).unwrap();
        let report = evaluate_image(&loaded, &StudyCamConfig::default().thresholds()).unwrap();
        assert!(report.passed);
        assert_eq!(report.brightness, 120.0);
    }

    #[test]
    fn test_check_blank_image_fails() {
        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([128u8])));
        let report = evaluate_image(&blank, &StudyCamConfig::default().thresholds()).unwrap();
        assert!(!report.passed);
        assert_eq!(report.sharpness, 0.0);
    }

    #[test]
    fn test_run_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studycam.toml");
        std::fs::write(&path, "[capture]\nauto_capture = true\ninterval_secs = 30\n").unwrap();

        let config = StudyCamConfig::load_from_file(&path).unwrap();
        let pipeline = config.pipeline_config();
        assert!(pipeline.auto_capture);
        assert_eq!(pipeline.auto_interval.secs(), 30);
    }
}
